//! Digest delivery with transport fallback and exponential backoff.
//!
//! A delivery runs as a small state machine:
//!
//! ```text
//! Idle -> AttemptingTransportA -> AttemptingTransportB -> Success
//!                 ^                        |
//!                 |                        +--> BackoffThenRetry --+
//!                 +------------------------------------------------+
//!                                          |
//!                                          +--> TerminalFailure
//! ```
//!
//! Transport A is SMTP over implicit TLS (port 465), transport B is SMTP with
//! a STARTTLS upgrade on the fallback port (587). One cycle tries A then B.
//! After a failed cycle the deliverer sleeps and starts over, up to
//! `max_cycles` cycles.
//!
//! # Backoff Strategy
//!
//! ```text
//! delay(cycle) = min(base_delay * 2^(cycle-1), max_delay) + random_jitter(0..=min(250ms, base_delay/4))
//! ```
//!
//! The jitter is capped at a quarter of the base delay so consecutive delays
//! strictly increase as long as `max_delay` is not reached.

use crate::config::DeliverySettings;
use crate::error::{DeliveryError, TransportError};
use crate::utils::truncate_for_log;
use lettre::message::{header::ContentType, Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use rand::{rng, Rng};
use std::fmt;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, instrument, warn};

/// SMTP servers can echo long multi-line replies into their errors.
const MAX_LOGGED_ERROR_BYTES: usize = 300;

/// A message ready to hand to a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
}

impl Envelope {
    /// Build the MIME message.
    pub fn to_message(&self) -> Result<Message, TransportError> {
        let from: Mailbox = self
            .from
            .parse()
            .map_err(|e| TransportError::Address(format!("{}: {e}", self.from)))?;
        let mut builder = Message::builder()
            .from(from)
            .subject(self.subject.clone())
            .header(ContentType::TEXT_HTML);
        for to in &self.to {
            let mailbox: Mailbox = to
                .parse()
                .map_err(|e| TransportError::Address(format!("{to}: {e}")))?;
            builder = builder.to(mailbox);
        }
        builder
            .body(self.html_body.clone())
            .map_err(|e| TransportError::Message(e.to_string()))
    }
}

/// One way of handing a message off.
#[allow(async_fn_in_trait)]
pub trait Transport {
    fn name(&self) -> &str;

    async fn send(&self, envelope: &Envelope) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// TLS from the first byte (SMTPS).
    Implicit,
    /// Plain connection upgraded with STARTTLS.
    StartTls,
}

impl fmt::Display for TlsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TlsMode::Implicit => "smtps",
            TlsMode::StartTls => "smtp+starttls",
        })
    }
}

/// SMTP relay through `lettre`.
pub struct SmtpTransport {
    name: String,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl fmt::Debug for SmtpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpTransport").field("name", &self.name).finish()
    }
}

impl SmtpTransport {
    pub fn new(
        host: &str,
        port: u16,
        mode: TlsMode,
        credentials: Option<Credentials>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let builder = match mode {
            TlsMode::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
            TlsMode::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
        }
        .map_err(|e| TransportError::Smtp(e.to_string()))?;

        let mut builder = builder.port(port).timeout(Some(timeout));
        if let Some(credentials) = credentials {
            builder = builder.credentials(credentials);
        }
        Ok(Self {
            name: format!("{mode}://{host}:{port}"),
            mailer: builder.build(),
        })
    }
}

impl Transport for SmtpTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let message = envelope.to_message()?;
        self.mailer
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| TransportError::Smtp(e.to_string()))
    }
}

/// Cycle count and delays between cycles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_cycles: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound for a single transport attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_cycles: 3,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before the cycle following `cycle` (1-based), jitter included.
    pub fn delay_after(&self, cycle: u32) -> Duration {
        let exp = cycle.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1 << exp).min(self.max_delay);
        let cap_ms = (self.base_delay.as_millis() / 4).min(250) as u64;
        let jitter_ms: u64 = rng().random_range(0..=cap_ms);
        delay + Duration::from_millis(jitter_ms)
    }
}

/// States of one delivery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeliveryState {
    Idle,
    AttemptingTransportA { cycle: u32 },
    AttemptingTransportB { cycle: u32 },
    BackoffThenRetry { cycle: u32, delay: Duration },
    Success,
    TerminalFailure,
}

/// Sends a rendered digest over two transports with retries.
#[derive(Debug)]
pub struct Deliverer<A, B> {
    primary: A,
    fallback: B,
    policy: RetryPolicy,
    from: String,
    to: Vec<String>,
}

impl<A: Transport, B: Transport> Deliverer<A, B> {
    pub fn new(primary: A, fallback: B, policy: RetryPolicy, from: String, to: Vec<String>) -> Self {
        Self {
            primary,
            fallback,
            policy,
            from,
            to,
        }
    }

    /// Deliver `document` with `subject`.
    ///
    /// # Errors
    ///
    /// [`DeliveryError::Exhausted`] once every cycle failed on both
    /// transports. This is the only error the pipeline treats as fatal.
    #[instrument(level = "info", skip_all, fields(%subject, bytes = document.len()))]
    pub async fn deliver(&self, document: &str, subject: &str) -> Result<(), DeliveryError> {
        let envelope = Envelope {
            from: self.from.clone(),
            to: self.to.clone(),
            subject: subject.to_string(),
            html_body: document.to_string(),
        };
        let total_t0 = Instant::now();
        let mut last_error: Option<TransportError> = None;
        let mut state = DeliveryState::Idle;

        loop {
            state = match state {
                DeliveryState::Idle => DeliveryState::AttemptingTransportA { cycle: 1 },
                DeliveryState::AttemptingTransportA { cycle } => {
                    match self.attempt(&self.primary, &envelope, cycle).await {
                        Ok(()) => DeliveryState::Success,
                        Err(e) => {
                            last_error = Some(e);
                            DeliveryState::AttemptingTransportB { cycle }
                        }
                    }
                }
                DeliveryState::AttemptingTransportB { cycle } => {
                    match self.attempt(&self.fallback, &envelope, cycle).await {
                        Ok(()) => DeliveryState::Success,
                        Err(e) => {
                            last_error = Some(e);
                            if cycle >= self.policy.max_cycles {
                                DeliveryState::TerminalFailure
                            } else {
                                DeliveryState::BackoffThenRetry {
                                    cycle,
                                    delay: self.policy.delay_after(cycle),
                                }
                            }
                        }
                    }
                }
                DeliveryState::BackoffThenRetry { cycle, delay } => {
                    warn!(cycle, max = self.policy.max_cycles, ?delay, "Delivery cycle failed; backing off");
                    sleep(delay).await;
                    DeliveryState::AttemptingTransportA { cycle: cycle + 1 }
                }
                DeliveryState::Success => {
                    info!(elapsed_ms_total = total_t0.elapsed().as_millis() as u64, "Digest delivered");
                    return Ok(());
                }
                DeliveryState::TerminalFailure => {
                    let last = last_error
                        .take()
                        .unwrap_or_else(|| TransportError::Smtp("no attempt was made".into()));
                    error!(
                        cycles = self.policy.max_cycles,
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                        error = %truncate_for_log(&last.to_string(), MAX_LOGGED_ERROR_BYTES),
                        "Delivery exhausted every attempt"
                    );
                    return Err(DeliveryError::Exhausted {
                        cycles: self.policy.max_cycles,
                        last,
                    });
                }
            };
            debug!(?state, "Delivery state");
        }
    }

    async fn attempt<T: Transport>(
        &self,
        transport: &T,
        envelope: &Envelope,
        cycle: u32,
    ) -> Result<(), TransportError> {
        let t0 = Instant::now();
        let result = match timeout(self.policy.attempt_timeout, transport.send(envelope)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.policy.attempt_timeout)),
        };
        if let Err(e) = &result {
            warn!(
                transport = transport.name(),
                cycle,
                elapsed_ms_attempt = t0.elapsed().as_millis() as u64,
                error = %truncate_for_log(&e.to_string(), MAX_LOGGED_ERROR_BYTES),
                "Delivery attempt failed"
            );
        }
        result
    }
}

/// Build the SMTP deliverer described by `settings`.
pub fn smtp_deliverer(
    settings: &DeliverySettings,
    credentials: Option<Credentials>,
) -> Result<Deliverer<SmtpTransport, SmtpTransport>, TransportError> {
    let attempt_timeout = Duration::from_secs(settings.timeout_secs);
    let primary = SmtpTransport::new(
        &settings.smtp_host,
        settings.implicit_tls_port,
        TlsMode::Implicit,
        credentials.clone(),
        attempt_timeout,
    )?;
    let fallback = SmtpTransport::new(
        &settings.smtp_host,
        settings.starttls_port,
        TlsMode::StartTls,
        credentials,
        attempt_timeout,
    )?;
    let policy = RetryPolicy {
        max_cycles: settings.max_cycles,
        base_delay: Duration::from_secs(settings.base_backoff_secs),
        max_delay: Duration::from_secs(settings.max_backoff_secs),
        attempt_timeout,
    };
    Ok(Deliverer::new(
        primary,
        fallback,
        policy,
        settings.from.clone(),
        settings.to.clone(),
    ))
}
