//! Record-keeping and reporting front for the meter stores.
//!
//! [`DataManager`] owns the readings log, the appliances log and the photo
//! store. It validates input before anything touches disk, appends accepted
//! records, and runs the analysis pipeline over whatever is stored when a
//! report is requested. Nothing is cached: every report reflects the logs
//! as they are at call time.

use std::path::Path;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use meter_core::models::{Appliance, PeriodUnit, Reading};
use meter_core::Result;
use meter_data::analysis::{analyze_usage, UsageReport};
use meter_data::deriver::UsageDeriver;
use meter_data::estimator::{ApplianceEstimator, ApplianceReport};
use meter_data::images::{ImageStore, ImageUpload, UPLOADS_DIR};
use meter_data::store::{
    ApplianceStore, CsvLog, ReadingStore, APPLIANCES_FILE, READINGS_FILE,
};

// ── DataManager ───────────────────────────────────────────────────────────────

/// Entry point for recording readings and appliances and for usage reports.
///
/// # Example
/// ```no_run
/// use chrono::Utc;
/// use meter_core::models::PeriodUnit;
/// use meter_runtime::data_manager::DataManager;
///
/// let mgr = DataManager::open("/tmp/meter-data", chrono_tz::Tz::UTC)?;
/// mgr.record_reading(Utc::now(), 1520.4, None)?;
/// let report = mgr.get_usage_report(PeriodUnit::Week)?;
/// # Ok::<(), meter_core::MeterError>(())
/// ```
pub struct DataManager {
    readings: Box<ReadingStore>,
    appliances: Box<ApplianceStore>,
    images: ImageStore,
    /// Timezone calendar periods are cut in.
    tz: Tz,
}

impl DataManager {
    /// Assemble a manager from existing stores.
    pub fn new(
        readings: Box<ReadingStore>,
        appliances: Box<ApplianceStore>,
        images: ImageStore,
        tz: Tz,
    ) -> Self {
        Self {
            readings,
            appliances,
            images,
            tz,
        }
    }

    /// Open the CSV logs and the uploads directory under `data_dir`,
    /// creating whatever is missing.
    pub fn open(data_dir: impl AsRef<Path>, tz: Tz) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let readings = CsvLog::<Reading>::open(data_dir.join(READINGS_FILE))?;
        let appliances = CsvLog::<Appliance>::open(data_dir.join(APPLIANCES_FILE))?;
        let images = ImageStore::open(data_dir.join(UPLOADS_DIR))?;

        tracing::debug!(data_dir = %data_dir.display(), timezone = %tz, "data manager ready");
        Ok(Self::new(Box::new(readings), Box::new(appliances), images, tz))
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    // ── Recording ─────────────────────────────────────────────────────────

    /// Validate and store a meter reading, with an optional photo.
    ///
    /// The reading is checked before the photo is written, and the photo is
    /// removed again if the reading cannot be appended, so a failed call
    /// never leaves an orphaned image behind.
    pub fn record_reading(
        &self,
        timestamp: DateTime<Utc>,
        reading: f64,
        image: Option<ImageUpload>,
    ) -> Result<Reading> {
        let mut record = Reading::new(timestamp, reading, None)?;

        let saved = match image {
            Some(upload) => Some(self.images.save(&record.timestamp, &upload)?),
            None => None,
        };
        record.image_path = saved
            .as_ref()
            .map(|path| path.to_string_lossy().into_owned());

        if let Err(e) = self.readings.append(&record) {
            if let Some(path) = &saved {
                self.images.discard(path);
            }
            return Err(e);
        }
        tracing::info!(
            timestamp = %record.timestamp,
            reading = record.reading,
            with_image = record.image_path.is_some(),
            "reading recorded"
        );
        Ok(record)
    }

    /// Validate and store an appliance profile.
    pub fn record_appliance(
        &self,
        name: &str,
        power_kw: f64,
        hours_per_day: f64,
    ) -> Result<Appliance> {
        let appliance = Appliance::new(name, power_kw, hours_per_day)?;
        self.appliances.append(&appliance)?;
        tracing::info!(
            name = %appliance.name,
            power_kw = appliance.power_kw,
            hours_per_day = appliance.hours_per_day,
            "appliance recorded"
        );
        Ok(appliance)
    }

    // ── Queries ───────────────────────────────────────────────────────────

    /// All readings in the order they were recorded.
    pub fn get_all_readings(&self) -> Result<Vec<Reading>> {
        self.readings.list_all()
    }

    /// All readings ordered by timestamp; equal timestamps keep their
    /// recording order.
    pub fn get_readings_chronological(&self) -> Result<Vec<Reading>> {
        Ok(UsageDeriver::sort_chronologically(&self.readings.list_all()?))
    }

    pub fn get_all_appliances(&self) -> Result<Vec<Appliance>> {
        self.appliances.list_all()
    }

    /// Usage per `unit` period, computed from every stored reading.
    pub fn get_usage_report(&self, unit: PeriodUnit) -> Result<UsageReport> {
        let readings = self.readings.list_all()?;
        Ok(analyze_usage(&readings, unit, self.tz))
    }

    /// Daily kWh estimate for every stored appliance.
    pub fn get_appliance_report(&self) -> Result<ApplianceReport> {
        let appliances = self.appliances.list_all()?;
        Ok(ApplianceEstimator::estimate(&appliances))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
