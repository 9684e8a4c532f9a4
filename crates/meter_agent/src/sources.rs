//! Canais analógicos: arquivo com contagem do ADC ou sinal simulado.

use meter_core::config::{SensorConfig, SensorSourceKind};
use meter_core::sensor::{AnalogSource, SensorError};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Faixa da onda simulada (leitura normalizada).
const SIM_LOW: f64 = 0.2;
const SIM_HIGH: f64 = 0.8;

/// Lê uma contagem inteira do ADC de um arquivo (ex: `in_voltage0_raw`).
pub struct FileSource {
    path: PathBuf,
    adc_max: u32,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, adc_max: u32) -> Self {
        Self {
            path: path.into(),
            adc_max,
        }
    }
}

impl AnalogSource for FileSource {
    fn read(&mut self) -> Result<f64, SensorError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| SensorError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        let count: f64 = raw
            .trim()
            .parse()
            .map_err(|_| SensorError::Parse(raw.trim().to_string()))?;

        let x = count / self.adc_max as f64;
        if !(0.0..=1.0).contains(&x) {
            return Err(SensorError::OutOfRange(count));
        }
        Ok(x)
    }
}

/// Onda triangular determinística entre 0.2 e 0.8.
pub struct SimulatedSource {
    started: Instant,
    period: Duration,
}

impl SimulatedSource {
    pub fn new(period: Duration) -> Self {
        Self {
            started: Instant::now(),
            period,
        }
    }

    fn value_at(&self, elapsed: Duration) -> f64 {
        let period = self.period.as_secs_f64();
        if period <= 0.0 {
            return SIM_LOW;
        }
        let phase = (elapsed.as_secs_f64() % period) / period;
        let tri = if phase < 0.5 { phase * 2.0 } else { 2.0 - phase * 2.0 };
        SIM_LOW + (SIM_HIGH - SIM_LOW) * tri
    }
}

impl AnalogSource for SimulatedSource {
    fn read(&mut self) -> Result<f64, SensorError> {
        Ok(self.value_at(self.started.elapsed()))
    }
}

/// Monta o canal descrito na configuração.
pub fn from_config(cfg: &SensorConfig) -> Box<dyn AnalogSource> {
    match cfg.source {
        SensorSourceKind::File => {
            info!("Sensor: {} (fundo de escala {})", cfg.path, cfg.adc_max);
            Box::new(FileSource::new(&cfg.path, cfg.adc_max))
        }
        SensorSourceKind::Simulated => {
            let period = Duration::try_from_secs_f64(cfg.sim_period_secs)
                .ok()
                .filter(|p| !p.is_zero())
                .unwrap_or_else(|| {
                    let fallback = SensorConfig::default().sim_period_secs;
                    warn!(
                        "sensor.sim_period_secs inválido ({}), usando {fallback}s",
                        cfg.sim_period_secs
                    );
                    Duration::from_secs_f64(fallback)
                });
            info!("Sensor: simulado (período {:.0}s)", period.as_secs_f64());
            Box::new(SimulatedSource::new(period))
        }
    }
}
