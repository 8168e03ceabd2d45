//! Builds a [`WeatherRecord`] section by section.
//!
//! Every section is committed independently: a failure downgrades only that
//! section's status and leaves the others as they were assembled.

use tracing::warn;

use crate::{
    error::{DriverError, RefreshError, Result},
    model::{Current, Days, Location, Section, ServiceStatus, Status, WeatherRecord},
    translate::Translator,
};

pub struct Assembler<'t> {
    record: WeatherRecord,
    translator: &'t dyn Translator,
}

impl<'t> Assembler<'t> {
    /// Starts from a blank record with every status at `Init`.
    pub fn new(horizon: usize, translator: &'t dyn Translator) -> Self {
        Self { record: WeatherRecord::blank(horizon), translator }
    }

    pub fn translator(&self) -> &'t dyn Translator {
        self.translator
    }

    pub fn horizon(&self) -> usize {
        self.record.days.len()
    }

    pub fn status(&self) -> &Status {
        &self.record.status
    }

    /// Passes `result` through, turning an error into an aborted refresh
    /// charged to `section`.
    pub fn require<T>(
        &mut self,
        section: Section,
        result: Result<T>,
    ) -> std::result::Result<T, RefreshError> {
        result.map_err(|err| self.abort(section, err))
    }

    pub fn abort(&mut self, section: Section, err: DriverError) -> RefreshError {
        self.abort_sections(&[section], err)
    }

    /// Like [`Assembler::abort`] for a request feeding several sections.
    pub fn abort_sections(&mut self, sections: &[Section], err: DriverError) -> RefreshError {
        for section in sections {
            self.fail(*section, &err);
        }
        RefreshError { status: self.record.status.clone(), source: err }
    }

    pub fn meta(&mut self, result: Result<Location>) {
        match result {
            Ok(location) => {
                self.record.location = location;
                self.ok(Section::Meta);
            }
            Err(err) => self.fail(Section::Meta, &err),
        }
    }

    pub fn current(&mut self, result: Result<Current>) {
        match result {
            Ok(current) => {
                self.record.current = current;
                self.ok(Section::Current);
            }
            Err(err) => self.fail(Section::Current, &err),
        }
    }

    pub fn forecast(&mut self, result: Result<Days>) {
        match result {
            Ok(days) if days.len() == self.horizon() => {
                self.record.days = days;
                self.ok(Section::Forecast);
            }
            Ok(days) => {
                let err = DriverError::Parse {
                    section: Section::Forecast,
                    reason: format!("expected {} days, got {}", self.horizon(), days.len()),
                };
                self.fail(Section::Forecast, &err);
            }
            Err(err) => self.fail(Section::Forecast, &err),
        }
    }

    pub fn finish(self) -> WeatherRecord {
        self.record
    }

    fn ok(&mut self, section: Section) {
        self.record.status.set(section, ServiceStatus::Ok);
    }

    fn fail(&mut self, section: Section, err: &DriverError) {
        warn!(%section, error = %err, "section failed");
        self.record.status.set(section, ServiceStatus::Error);
        self.record.status.last_error = Some(self.translator.translate(&err.to_string()));
    }
}
