//! # Meter Agent
//!
//! Amostra o sensor da tomada, acumula energia e sincroniza estado atual e
//! histórico com o banco remoto via HTTPS.
//!
//! ## Uso
//! ```bash
//! METER_STORE_URL=https://exemplo-default-rtdb.firebaseio.com meter_agent
//! ```

use meter_agent::link::HostLink;
use meter_agent::remote::{HttpTransport, RemoteSyncClient, StorePaths};
use meter_agent::sources;
use meter_agent::supervisor::Supervisor;
use meter_core::config::AgentConfig;
use meter_core::sensor::Sampler;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    let started = Instant::now();

    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Carregar config ──
    let config_path = AgentConfig::default_path();
    let mut config = match AgentConfig::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    config.apply_env();
    if let Err(e) = config.ensure_valid() {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    // ── Componentes ──
    let link = HostLink::new(&config.network.interface, &config.network.ssid);
    let sampler = Sampler::new(sources::from_config(&config.sensor), config.sensor.line_voltage);
    let client = RemoteSyncClient::new(
        HttpTransport::new(&config.store),
        StorePaths::from_config(&config.store),
        started,
    );
    info!("Componentes inicializados");

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   ⚡ MEDIDOR DE TOMADA – ATIVO (Rust)");
    println!("══════════════════════════════════════════════");
    println!("  Banco:     {}", config.store.base_url);
    println!("  Rede:      {}", config.network.ssid);
    println!("  Tensão:    {:.1} V", config.sensor.line_voltage);
    println!("  Envio:     a cada {:.1}s", config.timing.publish_interval_secs);
    println!("══════════════════════════════════════════════");
    println!();

    // ── Loop principal ──
    let mut supervisor = Supervisor::new(link, sampler, client, config.timing, started);
    supervisor.run()
}
