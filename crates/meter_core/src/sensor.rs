//! Amostragem do sensor proxy (LDR simulando um sensor Hall).
//!
//! Cadeia de conversão:
//!
//! ```text
//! leitura normalizada → tensão no divisor → resistência do LDR
//!                     → iluminância (lux) → corrente (A) → potência (W)
//! ```
//!
//! Toda anomalia é grampeada: a saída é sempre finita e dentro da faixa.

use crate::types::SampleReading;
use tracing::warn;

/// Expoente da curva do fotoresistor.
pub const LDR_GAMMA: f64 = 0.7;
/// Resistência do LDR a 10 lux (kΩ).
pub const LDR_RL10_KOHM: f64 = 33.0;
/// Resistor série do divisor (Ω).
pub const SERIES_RESISTOR_OHM: f64 = 2000.0;
/// Tensão de referência do ADC (V).
pub const ADC_REFERENCE_V: f64 = 3.3;
/// Mapeamento fictício: 100 lux ≈ 1 A.
pub const LUX_PER_AMP: f64 = 100.0;
/// Limite superior de corrente (A).
pub const MAX_CURRENT_A: f64 = 10.0;

/// Erros de leitura do canal analógico.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("Falha ao ler {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Leitura inválida: {0:?}")]
    Parse(String),

    #[error("Leitura fora da faixa: {0}")]
    OutOfRange(f64),
}

/// Canal analógico que entrega uma leitura normalizada em [0, 1].
pub trait AnalogSource {
    fn read(&mut self) -> Result<f64, SensorError>;
}

impl<S: AnalogSource + ?Sized> AnalogSource for Box<S> {
    fn read(&mut self) -> Result<f64, SensorError> {
        (**self).read()
    }
}

/// Converte uma leitura normalizada em corrente (A), grampeada em [0, 10].
pub fn current_from_normalized(x: f64) -> f64 {
    if x.is_nan() {
        return 0.0;
    }
    let x = x.clamp(0.0, 1.0);

    let voltage = x * ADC_REFERENCE_V;
    let resistance = SERIES_RESISTOR_OHM * voltage / (1.0 - voltage / ADC_REFERENCE_V);

    // x = 0: LDR saturado (resistência nula) → corrente máxima
    if resistance <= 0.0 {
        return MAX_CURRENT_A;
    }
    // x = 1: divisor aberto → sem luz
    if !resistance.is_finite() {
        return 0.0;
    }

    let k = LDR_RL10_KOHM * 1e3 * 10f64.powf(LDR_GAMMA);
    let lux = (k / resistance).powf(1.0 / LDR_GAMMA);
    let current = lux / LUX_PER_AMP;

    if current.is_nan() {
        0.0
    } else {
        current.clamp(0.0, MAX_CURRENT_A)
    }
}

/// Amostrador: lê o canal e aplica o modelo de transferência.
pub struct Sampler<S> {
    source: S,
    line_voltage: f64,
}

impl<S: AnalogSource> Sampler<S> {
    pub fn new(source: S, line_voltage: f64) -> Self {
        Self {
            source,
            line_voltage,
        }
    }

    pub fn line_voltage(&self) -> f64 {
        self.line_voltage
    }

    /// Faz um poll do sensor. Falha de leitura vira amostra zerada.
    pub fn sample(&mut self) -> SampleReading {
        let x = match self.source.read() {
            Ok(x) => x,
            Err(e) => {
                warn!("Leitura do sensor falhou, usando 0 A: {e}");
                return SampleReading::default();
            }
        };

        let current = current_from_normalized(x);
        SampleReading {
            current,
            power: current * self.line_voltage,
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
