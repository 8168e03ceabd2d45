//! Host-facing refresh loop glue.
//!
//! A [`WeatherFeed`] owns one driver and the last published record. After a
//! refresh the host is told which parts to redraw through a [`RenderSink`].

use chrono::NaiveDate;
use tracing::{error, info};

use crate::{
    model::WeatherRecord,
    provider::{Link, WeatherDriver},
};

/// Display callbacks fired after a refresh.
pub trait RenderSink {
    fn display_meta(&mut self, record: &WeatherRecord);
    fn display_current(&mut self, record: &WeatherRecord);
    fn display_forecast(&mut self, record: &WeatherRecord);
    fn show_error(&mut self, message: &str);
}

#[derive(Debug)]
pub struct WeatherFeed {
    driver: Box<dyn WeatherDriver>,
    record: WeatherRecord,
}

impl WeatherFeed {
    pub fn new(driver: Box<dyn WeatherDriver>) -> Self {
        let record = WeatherRecord::blank(driver.capabilities().horizon);
        Self { driver, record }
    }

    pub fn driver(&self) -> &dyn WeatherDriver {
        self.driver.as_ref()
    }

    /// Last published record; blank until the first refresh.
    pub fn record(&self) -> &WeatherRecord {
        &self.record
    }

    pub fn link(&self) -> Link {
        self.driver.link(&self.record)
    }

    /// Refresh using the local calendar date.
    pub async fn refresh(&mut self, sink: &mut dyn RenderSink) -> bool {
        self.refresh_on(sink, chrono::Local::now().date_naive()).await
    }

    /// Run one refresh and publish the result.
    ///
    /// On success the new record replaces the old one and all three display
    /// signals fire. An aborted refresh keeps the previous data, takes the
    /// failure's statuses and reports the message through `show_error`.
    pub async fn refresh_on(&mut self, sink: &mut dyn RenderSink, today: NaiveDate) -> bool {
        let id = self.driver.id();
        match self.driver.fetch(today).await {
            Ok(record) => {
                info!(provider = %id, ok = record.status.is_ok(), "refresh complete");
                self.record = record;
                sink.display_meta(&self.record);
                sink.display_current(&self.record);
                sink.display_forecast(&self.record);
                true
            }
            Err(failure) => {
                error!(provider = %id, error = %failure, "refresh aborted");
                let message = failure
                    .status
                    .last_error
                    .clone()
                    .unwrap_or_else(|| failure.to_string());
                self.record.status = failure.status;
                sink.show_error(&message);
                false
            }
        }
    }
}
