use anyhow::Result;
use chat_relay::bin_common::{
    compose_outbound, init_tracing, load_config_from_env, load_connection_config, parse_args,
    BinaryRunner, ConfigType, RunConfig,
};
use chat_relay::chatwire::{ChatClient, ChatEvent, Topic};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};

/// Terminal chat session: stdin lines out, reassembled messages in
struct ChatApp {
    client: ChatClient,
    name: String,
    run_config: RunConfig,
}

impl ChatApp {
    fn new(client: ChatClient, name: String) -> Self {
        Self {
            client,
            name,
            run_config: RunConfig::new("Chat Client").with_stats_interval(300),
        }
    }

    fn subscribe_console(&self) {
        self.client.subscribe(Topic::MESSAGE_COMPLETE, |event| {
            if let Some(text) = event.text() {
                let mut stdout = std::io::stdout().lock();
                write!(stdout, "\n{text}")?;
                stdout.flush()?;
            }
            Ok(())
        });

        self.client.subscribe(Topic::MESSAGE_PARTIAL, |event| {
            if let Some(text) = event.text() {
                let mut stdout = std::io::stdout().lock();
                write!(stdout, "{text}")?;
                stdout.flush()?;
            }
            Ok(())
        });

        self.client.subscribe(Topic::CONNECTED, |event| {
            if let ChatEvent::Connected { address } = event {
                info!("Connected to {}", address);
            }
            Ok(())
        });

        self.client.subscribe(Topic::DISCONNECTED, |event| {
            if let ChatEvent::Disconnected { reason } = event {
                warn!("Disconnected: {}", reason);
            }
            Ok(())
        });

        self.client.subscribe(Topic::RECONNECT_SCHEDULED, |event| {
            if let ChatEvent::ReconnectScheduled { delay, attempt } = event {
                info!("Reconnecting in {:.1}s (attempt {})", delay.as_secs_f64(), attempt);
            }
            Ok(())
        });

        self.client.subscribe(Topic::RECONNECT_EXHAUSTED, |event| {
            if let ChatEvent::ReconnectExhausted { attempts } = event {
                error!(
                    "Gave up after {} reconnect attempts; type /reconnect to try again",
                    attempts
                );
            }
            Ok(())
        });
    }

    fn handle_line(&self, line: &str) -> Result<bool> {
        match line {
            "" => {}
            "/quit" => return Ok(false),
            "/reconnect" => {
                info!("Reconnecting on request");
                self.client.connect_configured()?;
            }
            message => {
                if !self.client.is_connected() {
                    warn!("Not connected ({}), message dropped", self.client.state());
                }
                self.client.send(compose_outbound(&self.name, message))?;
            }
        }
        Ok(true)
    }
}

impl BinaryRunner for ChatApp {
    async fn run(&mut self) -> Result<()> {
        self.subscribe_console();
        self.client.connect_configured()?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stats = tokio::time::interval(Duration::from_secs(self.run_config.stats_interval_secs));
        stats.tick().await;

        loop {
            tokio::select! {
                _ = signal::ctrl_c() => {
                    info!("Ctrl+C received, shutting down");
                    break;
                }
                line = lines.next_line() => {
                    match line? {
                        Some(line) => {
                            if !self.handle_line(line.trim())? {
                                break;
                            }
                        }
                        None => {
                            info!("stdin closed");
                            break;
                        }
                    }
                }
                _ = stats.tick() => {
                    let metrics = self.client.metrics();
                    info!(
                        "[{}] sent={} received={} messages={} reconnects={}",
                        metrics.connection_state,
                        metrics.frames_sent,
                        metrics.frames_received,
                        metrics.messages_received,
                        metrics.reconnect_count
                    );
                }
            }
        }

        Ok(())
    }

    fn config(&self) -> &RunConfig {
        &self.run_config
    }

    fn stats(&self) -> Option<String> {
        let metrics = self.client.metrics();
        Some(format!(
            "Frames sent: {}, messages received: {}, reconnects: {}",
            metrics.frames_sent, metrics.messages_received, metrics.reconnect_count
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let name = parse_args()
        .into_iter()
        .next()
        .or_else(|| std::env::var("CHAT_NAME").ok())
        .unwrap_or_else(|| "anonymous".to_string());

    let config_path = load_config_from_env(ConfigType::Chat);
    let config = load_connection_config(&config_path)?;
    info!(
        "Chatting as '{}' on {} (max {} reconnect attempts)",
        name, config.address, config.max_attempts
    );

    let client = ChatClient::from_config(config)?;
    let mut app = ChatApp::new(client, name);
    let result = app.execute().await;

    app.client.shutdown().await?;
    result
}
