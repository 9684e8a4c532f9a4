//! Integrador de energia acumulada (kWh).

/// Segundos por hora.
const SECS_PER_HOUR: f64 = 3600.0;
/// Watts por quilowatt.
const WATTS_PER_KW: f64 = 1000.0;

/// Acumulador de energia desde o início do processo.
///
/// Monotonicamente não decrescente: contribuições negativas ou não finitas
/// são descartadas.
#[derive(Debug, Clone, Default)]
pub struct EnergyIntegrator {
    accumulated_kwh: f64,
}

impl EnergyIntegrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Soma `power · Δt` e retorna o total acumulado (kWh).
    pub fn integrate(&mut self, power_w: f64, elapsed_secs: f64) -> f64 {
        let delta = power_w * elapsed_secs / SECS_PER_HOUR / WATTS_PER_KW;
        if delta.is_finite() && delta > 0.0 {
            self.accumulated_kwh += delta;
        }
        self.accumulated_kwh
    }

    pub fn total_kwh(&self) -> f64 {
        self.accumulated_kwh
    }
}
