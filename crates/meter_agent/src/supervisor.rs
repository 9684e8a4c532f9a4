//! Supervisor de conectividade – laço amostra → integra → codifica → publica.
//!
//! Máquina de estados:
//!
//! ```text
//! Disconnected ──► Connecting ──► Connected
//!      ▲                              │
//!      └──────── perda detectada ─────┘
//! ```
//!
//! A cada (re)conexão a identidade é recalculada e exatamente um chamado de
//! registro é enviado. Amostragem e integração ocorrem em toda iteração
//! conectada; a publicação só quando o intervalo de envio já passou.

use crate::link::NetworkLink;
use crate::remote::{RemoteSyncClient, Transport};
use meter_core::config::{EnergyInterval, TimingConfig};
use meter_core::energy::EnergyIntegrator;
use meter_core::identity::resolve;
use meter_core::sensor::{AnalogSource, Sampler};
use meter_core::types::{DeviceIdentity, TelemetryRecord};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Estado do enlace visto pelo supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// Resultado de uma iteração do laço.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Conexão perdida e restabelecida; amostragem pulada
    Reconnected { registered: bool },
    /// Amostra integrada, ainda dentro do intervalo de envio
    Sampled { energy_kwh: f64 },
    /// Amostra integrada e publicada
    Published { state_ok: bool, history_ok: bool },
    /// Envio devido, mas sem identidade: nenhuma chamada remota
    Skipped { energy_kwh: f64 },
}

/// Estado mutável do agente, com um único escritor (o laço).
#[derive(Debug)]
pub struct AgentState {
    pub link: LinkState,
    pub identity: Option<DeviceIdentity>,
    pub energy: EnergyIntegrator,
    pub started: Instant,
    pub last_publish: Instant,
    pub last_sample: Option<Instant>,
    pub connections: u32,
}

impl AgentState {
    fn new(started: Instant) -> Self {
        Self {
            link: LinkState::Disconnected,
            identity: None,
            energy: EnergyIntegrator::new(),
            started,
            last_publish: started,
            last_sample: None,
            connections: 0,
        }
    }
}

pub struct Supervisor<L, S, T> {
    link: L,
    sampler: Sampler<S>,
    client: RemoteSyncClient<T>,
    timing: TimingConfig,
    state: AgentState,
}

impl<L, S, T> Supervisor<L, S, T>
where
    L: NetworkLink,
    S: AnalogSource,
    T: Transport,
{
    /// `started` deve ser o mesmo instante usado pelo cliente remoto.
    pub fn new(
        link: L,
        sampler: Sampler<S>,
        client: RemoteSyncClient<T>,
        timing: TimingConfig,
        started: Instant,
    ) -> Self {
        Self {
            link,
            sampler,
            client,
            timing,
            state: AgentState::new(started),
        }
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn client(&self) -> &RemoteSyncClient<T> {
        &self.client
    }

    /// Conecta e roda para sempre.
    pub fn run(&mut self) -> ! {
        self.establish();
        loop {
            match self.tick(Instant::now()) {
                // A espera pós-reconexão já foi feita
                TickOutcome::Reconnected { .. } => continue,
                TickOutcome::Sampled { energy_kwh } => {
                    let wait = next_publish_in(&self.state, &self.timing, Instant::now());
                    debug!("Energia acumulada: {energy_kwh:.6} kWh, próximo envio em {wait:?}");
                }
                TickOutcome::Published { .. } => {}
                TickOutcome::Skipped { .. } => {
                    warn!("Envio pulado: dispositivo sem identidade");
                }
            }
            std::thread::sleep(self.timing.idle_delay());
        }
    }

    /// Conexão bloqueante: tenta até conseguir, com backoff limitado.
    ///
    /// Em seguida resolve a identidade e envia um único chamado de registro.
    /// Retorna se o registro foi aceito.
    pub fn establish(&mut self) -> bool {
        self.state.link = LinkState::Connecting;
        self.client.set_online(false);
        info!("Conectando à rede...");

        let mut attempt = 0u32;
        while let Err(e) = self.link.connect() {
            let wait = self.timing.reconnect_backoff(attempt);
            debug!("Tentativa {} falhou ({e}), nova em {wait:?}", attempt + 1);
            std::thread::sleep(wait);
            attempt = attempt.saturating_add(1);
        }

        self.state.link = LinkState::Connected;
        self.state.last_sample = None;
        self.client.set_online(true);

        self.state.identity = match resolve(self.link.hardware_address().as_deref()) {
            Ok(id) => {
                info!("Device ID (MAC): {id}");
                Some(id)
            }
            Err(e) => {
                warn!("Conectado, mas sem identidade: {e}");
                None
            }
        };

        self.state.connections += 1;
        self.client.register_device(self.state.identity.as_ref())
    }

    /// Uma iteração do laço, sem a espera ociosa.
    ///
    /// Se a conexão caiu, bloqueia até reconectar e ainda aguarda
    /// `reconnect_settle` antes de retornar.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if !self.link.is_connected() {
            warn!("Rede desconectada, reconectando...");
            self.state.link = LinkState::Disconnected;
            self.client.set_online(false);

            let registered = self.establish();
            std::thread::sleep(self.timing.reconnect_settle());
            return TickOutcome::Reconnected { registered };
        }
        self.client.set_online(true);

        // Leitura → integração
        let sample = self.sampler.sample();
        let dt = self.integration_interval(now);
        let energy_kwh = self.state.energy.integrate(sample.power, dt);
        self.state.last_sample = Some(now);

        if now.saturating_duration_since(self.state.last_publish) < self.timing.publish_interval() {
            return TickOutcome::Sampled { energy_kwh };
        }

        if self.state.identity.is_none() {
            self.state.last_publish = now;
            return TickOutcome::Skipped { energy_kwh };
        }

        let ts = now.saturating_duration_since(self.state.started).as_secs();
        let record =
            TelemetryRecord::from_sample(self.sampler.line_voltage(), sample, energy_kwh, ts);
        debug!("Enviando: {record:?}");

        let id = self.state.identity.as_ref();
        let state_ok = self.client.publish_state(id, &record);
        let history_ok = self.client.append_history(id, &record);

        if state_ok {
            info!("Estado atual atualizado.");
        } else {
            warn!("Falha no PUT do estado atual.");
        }
        if history_ok {
            info!("Registro salvo no histórico.");
        } else {
            warn!("Falha no POST do histórico.");
        }

        // Falhas não são repetidas: o próximo envio usa uma amostra nova
        self.state.last_publish = now;
        TickOutcome::Published {
            state_ok,
            history_ok,
        }
    }

    /// Δt da integração: fixo (aproximação histórica) ou medido entre ticks.
    fn integration_interval(&self, now: Instant) -> f64 {
        let nominal = self.timing.nominal_interval_secs;
        match (self.timing.energy_interval, self.state.last_sample) {
            (EnergyInterval::Measured, Some(prev)) => {
                now.saturating_duration_since(prev).as_secs_f64()
            }
            _ => nominal,
        }
    }
}

/// Intervalo até o próximo envio, para logs de diagnóstico.
pub fn next_publish_in(state: &AgentState, timing: &TimingConfig, now: Instant) -> Duration {
    timing
        .publish_interval()
        .saturating_sub(now.saturating_duration_since(state.last_publish))
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::StorePaths;
    use crate::testing::{FakeLink, FixedSource, MemoryStore};
    use meter_core::config::StoreConfig;
    use crate::testing::decode_record;

    const STATE: &str = "/tomadas/AABBCCDDEEFF.json";
    const HISTORY: &str = "/tomadas/AABBCCDDEEFF/historico.json";
    const REGISTRATION: &str = "/device_calls/AABBCCDDEEFF.json";

    type TestSupervisor = Supervisor<FakeLink, FixedSource, MemoryStore>;

    fn fast_timing() -> TimingConfig {
        TimingConfig {
            reconnect_backoff_ms: 0,
            reconnect_backoff_max_ms: 0,
            reconnect_settle_secs: 0.0,
            ..TimingConfig::default()
        }
    }

    fn supervisor_with(timing: TimingConfig) -> (TestSupervisor, Instant) {
        let started = Instant::now();
        let store_cfg = StoreConfig {
            base_url: "https://rtdb.example".into(),
            ..StoreConfig::default()
        };
        let client = RemoteSyncClient::new(
            MemoryStore::new(),
            StorePaths::from_config(&store_cfg),
            started,
        );
        let sup = Supervisor::new(
            FakeLink::new("aa:bb:cc:dd:ee:ff"),
            Sampler::new(FixedSource(0.5), 127.8),
            client,
            timing,
            started,
        );
        (sup, started)
    }

    fn connected_supervisor() -> (TestSupervisor, Instant) {
        let (mut sup, started) = supervisor_with(fast_timing());
        assert!(sup.establish());
        (sup, started)
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn establish_resolves_identity_and_registers_once() {
        let (sup, _) = connected_supervisor();
        assert_eq!(sup.state().link, LinkState::Connected);
        assert_eq!(sup.state().identity.as_ref().unwrap().as_str(), "AABBCCDDEEFF");
        assert_eq!(sup.client().transport().requests_to(REGISTRATION), 1);
        assert_eq!(sup.client().transport().request_count(), 1);
    }

    #[test]
    fn connect_retries_until_attached() {
        let (mut sup, _) = supervisor_with(fast_timing());
        sup.link_mut().connect_script.extend([false, false, false]);
        assert!(sup.establish());
        assert_eq!(sup.link_mut().connect_attempts, 4);
        assert_eq!(sup.client().transport().requests_to(REGISTRATION), 1);
    }

    #[test]
    fn publishes_only_after_interval() {
        let (mut sup, t0) = connected_supervisor();

        for s in 1..5 {
            assert!(matches!(sup.tick(t0 + secs(s)), TickOutcome::Sampled { .. }));
        }
        assert_eq!(
            sup.tick(t0 + secs(5)),
            TickOutcome::Published {
                state_ok: true,
                history_ok: true
            }
        );
        assert!(matches!(sup.tick(t0 + secs(6)), TickOutcome::Sampled { .. }));

        let store = sup.client().transport();
        assert_eq!(store.log(HISTORY).len(), 1);
        let state = decode_record(&store.document(STATE).unwrap());
        assert_eq!(state.ts, 5);
        assert_eq!(state.voltage, 127.8);
    }

    #[test]
    fn energy_uses_nominal_interval_per_tick() {
        let (mut sup, t0) = connected_supervisor();
        // Ticks espaçados de 3 s continuam contando 1 s cada
        sup.tick(t0 + secs(3));
        sup.tick(t0 + secs(6));

        let current = meter_core::sensor::current_from_normalized(0.5);
        let expected = 2.0 * current * 127.8 / 3600.0 / 1000.0;
        assert!((sup.state().energy.total_kwh() - expected).abs() < 1e-12);
    }

    #[test]
    fn measured_interval_tracks_elapsed_time() {
        let timing = TimingConfig {
            energy_interval: EnergyInterval::Measured,
            ..fast_timing()
        };
        let (mut sup, t0) = supervisor_with(timing);
        sup.establish();
        sup.tick(t0 + secs(1));
        sup.tick(t0 + secs(4));

        let power = meter_core::sensor::current_from_normalized(0.5) * 127.8;
        // Primeiro tick usa o intervalo nominal; o segundo, 3 s medidos
        let expected = power * (1.0 + 3.0) / 3600.0 / 1000.0;
        assert!((sup.state().energy.total_kwh() - expected).abs() < 1e-12);
    }

    #[test]
    fn history_grows_once_per_publish() {
        let (mut sup, t0) = connected_supervisor();
        for s in 1..=20 {
            sup.tick(t0 + secs(s));
        }
        let store = sup.client().transport();
        let history = store.log(HISTORY);
        assert_eq!(history.len(), 4);

        let energies: Vec<f64> = history
            .iter()
            .map(|e| decode_record(e).energy)
            .collect();
        assert!(energies.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(store.document_count(), 2); // registro + estado
    }

    #[test]
    fn connectivity_loss_skips_sampling_and_reregisters() {
        let (mut sup, t0) = connected_supervisor();
        sup.tick(t0 + secs(1));
        let energy_before = sup.state().energy.total_kwh();

        sup.link_mut().connected = false;
        assert_eq!(
            sup.tick(t0 + secs(2)),
            TickOutcome::Reconnected { registered: true }
        );
        assert_eq!(sup.state().energy.total_kwh(), energy_before);
        assert_eq!(sup.state().connections, 2);
        assert_eq!(sup.state().identity.as_ref().unwrap().as_str(), "AABBCCDDEEFF");

        // Retoma a cadência normal sem novos registros
        for s in 3..=10 {
            sup.tick(t0 + secs(s));
        }
        let store = sup.client().transport();
        assert_eq!(store.requests_to(REGISTRATION), 2);
        assert!(sup.state().energy.total_kwh() > energy_before);
    }

    #[test]
    fn failed_publish_is_not_retried() {
        let (mut sup, t0) = connected_supervisor();
        sup.client().transport().set_status(500);

        sup.tick(t0 + secs(4));
        let energy_before = sup.state().energy.total_kwh();
        assert_eq!(
            sup.tick(t0 + secs(5)),
            TickOutcome::Published {
                state_ok: false,
                history_ok: false
            }
        );
        assert!(sup.state().energy.total_kwh() >= energy_before);
        let requests_after_failure = sup.client().transport().request_count();

        // Próximo tick não reenvia o registro antigo
        sup.client().transport().heal();
        assert!(matches!(sup.tick(t0 + secs(6)), TickOutcome::Sampled { .. }));
        assert_eq!(sup.client().transport().request_count(), requests_after_failure);

        assert!(matches!(
            sup.tick(t0 + secs(10)),
            TickOutcome::Published { state_ok: true, history_ok: true }
        ));
        let state = decode_record(&sup.client().transport().document(STATE).unwrap());
        assert_eq!(state.ts, 10);
    }

    #[test]
    fn missing_identity_skips_remote_calls() {
        let (mut sup, t0) = supervisor_with(fast_timing());
        sup.link_mut().mac = None;
        assert!(!sup.establish());
        assert!(sup.state().identity.is_none());

        assert!(matches!(sup.tick(t0 + secs(5)), TickOutcome::Skipped { .. }));
        assert!(matches!(sup.tick(t0 + secs(6)), TickOutcome::Sampled { .. }));
        assert!(sup.state().energy.total_kwh() > 0.0);
        assert_eq!(sup.client().transport().request_count(), 0);
    }

    #[test]
    fn next_publish_countdown() {
        let (sup, t0) = connected_supervisor();
        let timing = TimingConfig::default();
        assert_eq!(next_publish_in(sup.state(), &timing, t0 + secs(2)), secs(3));
        assert_eq!(next_publish_in(sup.state(), &timing, t0 + secs(9)), Duration::ZERO);
    }
}
