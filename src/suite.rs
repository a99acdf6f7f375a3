//! Suite orchestration: composes discovery, validation, resolution and the
//! conversation drivers into the operations the CLI exposes.
//!
//! Every operation returns a [`Report`]; nothing here fails once the suite
//! has been built. Each operation runs in its own task under the overall
//! budget. Sections are recorded as they are produced, so a panic or an
//! exhausted budget still leaves the sections that were reached in the
//! report. Driver sections of `suite all` run concurrently in their own
//! tasks and are appended in a fixed order.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use futures::future::{join_all, BoxFuture, FutureExt};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::card::{
    build_origin, check_origin, fetch_card, resolve_card_url, run_card_rules, validate_schema,
    CapabilityDocument, SchemaValidator, StructuralValidator,
};
use crate::catalog::{CARD_SKIP, CARD_STRUCT, NET_001, REST_URL, RPC_STREAM, RPC_URL};
use crate::client::{HttpClient, Method};
use crate::config::ProbeConfig;
use crate::driver::{DriverOptions, JsonRpcDriver, RestDriver};
use crate::error::ProbeResult;
use crate::report::{Finding, Report, Section, SectionKind};
use crate::resolver::{resolve, Resolution, TransportKind};
use crate::stream::StreamValidator;
use crate::types::{JsonRpcRequest, SendMessageParams};

const CARD_SECTIONS: &[SectionKind] =
    &[SectionKind::Network, SectionKind::Schema, SectionKind::Card];

const ALL_SECTIONS: &[SectionKind] = &[
    SectionKind::Network,
    SectionKind::Schema,
    SectionKind::Card,
    SectionKind::JsonRpc,
    SectionKind::Rest,
];

/// Entry point for every operation.
///
/// # Example
///
/// ```no_run
/// use a2a_check::{ProbeConfig, Suite};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let suite = Suite::structural(ProbeConfig::default())?;
/// let report = suite.suite_all("http://localhost:9999", None).await;
/// print!("{report}");
/// std::process::exit(report.exit_code(suite.config().fail_on_warn));
/// # }
/// ```
#[derive(Clone)]
pub struct Suite {
    config: ProbeConfig,
    http: HttpClient,
    schema: Arc<dyn SchemaValidator>,
    streams: StreamValidator,
}

impl std::fmt::Debug for Suite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Suite")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Suite {
    /// Build a suite with a custom schema validator.
    ///
    /// # Errors
    ///
    /// Fails only when the HTTP client cannot be built from the config.
    pub fn new(config: ProbeConfig, schema: Arc<dyn SchemaValidator>) -> ProbeResult<Self> {
        let http = HttpClient::new(&config)?;
        let streams = StreamValidator::new(config.stream_timeout);
        Ok(Self {
            config,
            http,
            schema,
            streams,
        })
    }

    /// Build a suite with the built-in [`StructuralValidator`].
    pub fn structural(config: ProbeConfig) -> ProbeResult<Self> {
        Self::new(config, Arc::new(StructuralValidator))
    }

    /// The configuration this suite runs with.
    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Origin and card endpoint reachability.
    pub async fn net_probe(&self, target: &str) -> Report {
        let target = target.to_string();
        self.supervised("net probe", &[SectionKind::Network], move |suite, progress| async move {
            suite.network_phase(&progress, &target, None).await;
        })
        .await
    }

    /// Fetch the card and run schema and card rules.
    pub async fn card_fetch(&self, target: &str, card_url: Option<&str>) -> Report {
        let target = target.to_string();
        let card_url = card_url.map(str::to_string);
        self.supervised("card fetch", CARD_SECTIONS, move |suite, progress| async move {
            suite.card_phase(&progress, &target, card_url.as_deref()).await;
        })
        .await
    }

    /// Same as [`Suite::card_fetch`].
    pub async fn card_validate(&self, target: &str, card_url: Option<&str>) -> Report {
        self.card_fetch(target, card_url).await
    }

    /// Request/response JSON-RPC steps against a known endpoint.
    pub async fn rpc_ping(&self, url: &str) -> Report {
        let url = url.to_string();
        self.supervised("rpc ping", &[SectionKind::JsonRpc], move |suite, progress| async move {
            progress.begin(SectionKind::JsonRpc).await;
            let section = suite.jsonrpc_driver(&url, DriverOptions::ping()).run(None).await;
            progress.complete(section).await;
        })
        .await
    }

    /// Discover the card, then ping its JSON-RPC binding.
    pub async fn rpc_ping_from_card(&self, target: &str, card_url: Option<&str>) -> Report {
        let target = target.to_string();
        let card_url = card_url.map(str::to_string);
        let expected = &[SectionKind::Network, SectionKind::Schema, SectionKind::JsonRpc];
        self.supervised("rpc ping-from-card", expected, move |suite, progress| async move {
            let (doc, resolution) = suite.card_phase(&progress, &target, card_url.as_deref()).await;
            let section = suite
                .jsonrpc_job(&progress, doc.as_ref(), &resolution, DriverOptions::ping())
                .await
                .await;
            progress.complete(section).await;
        })
        .await
    }

    /// Open one `message/stream` and validate it.
    pub async fn rpc_stream(&self, url: &str, text: &str) -> Report {
        let url = url.to_string();
        let text = text.to_string();
        self.supervised("rpc stream", &[SectionKind::JsonRpc], move |suite, progress| async move {
            progress.begin(SectionKind::JsonRpc).await;
            let request =
                JsonRpcRequest::with_params("message/stream", &SendMessageParams::text(&text));
            let opened = suite
                .http
                .open_event_stream(Method::POST, &url, Some(&request.to_value()))
                .await;
            let outcome = suite.streams.validate(RPC_STREAM, opened).await;
            progress
                .complete(Section::with_findings(SectionKind::JsonRpc, vec![outcome.finding]))
                .await;
        })
        .await
    }

    /// The full suite: network, schema, card, jsonrpc and rest sections.
    pub async fn suite_all(&self, target: &str, card_url: Option<&str>) -> Report {
        let target = target.to_string();
        let card_url = card_url.map(str::to_string);
        self.supervised("suite all", ALL_SECTIONS, move |suite, progress| async move {
            let (doc, resolution) = suite.card_phase(&progress, &target, card_url.as_deref()).await;
            let jobs = vec![
                suite
                    .jsonrpc_job(&progress, doc.as_ref(), &resolution, DriverOptions::default())
                    .await,
                suite
                    .rest_job(&progress, doc.as_ref(), &resolution, DriverOptions::default())
                    .await,
            ];
            join_all(jobs.into_iter().map(|job| {
                let progress = progress.clone();
                async move { progress.complete(job.await).await }
            }))
            .await;
        })
        .await
    }

    /// Run one operation in its own task under the overall budget.
    ///
    /// A panic or an exhausted budget becomes an `INTERNAL` finding in the
    /// first unfinished section; the sections after it get a skip row.
    async fn supervised<F, Fut>(
        &self,
        operation: &'static str,
        expected: &[SectionKind],
        run: F,
    ) -> Report
    where
        F: FnOnce(Suite, Progress) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let started = Instant::now();
        let budget = self.config.overall_budget;
        let progress = Progress::default();

        let job = tokio::spawn(run(self.clone(), progress.clone()));
        let abort = job.abort_handle();
        let fault = match tokio::time::timeout(budget, job).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => {
                tracing::warn!(operation, error = %e, "operation task failed");
                Some(format!("{operation} task failed: {e}"))
            }
            Err(_) => {
                abort.abort();
                tracing::warn!(
                    operation,
                    budget_secs = budget.as_secs_f64(),
                    "overall budget exhausted"
                );
                Some(format!("overall budget of {:.1}s exhausted", budget.as_secs_f64()))
            }
        };

        let report = progress.finish(expected, fault.as_deref()).await;
        tracing::info!(
            operation,
            elapsed_ms = started.elapsed().as_millis() as u64,
            severity = ?report.severity(),
            "operation complete"
        );
        report
    }

    /// Reachability and card fetch; the network section is recorded one
    /// step at a time.
    async fn network_phase(
        &self,
        progress: &Progress,
        target: &str,
        card_url: Option<&str>,
    ) -> Option<Value> {
        let kind = SectionKind::Network;
        let well_known = self.config.normalized_well_known_path();
        let origin = build_origin(target);
        let card_url = resolve_card_url(target, card_url, &well_known);
        tracing::debug!(%origin, %card_url, "discovering agent card");

        progress.record(kind, [check_origin(&self.http, &origin).await]).await;
        let (findings, body) = fetch_card(&self.http, &card_url).await;
        progress.record(kind, findings).await;
        progress.close(kind).await;
        body
    }

    async fn card_phase(
        &self,
        progress: &Progress,
        target: &str,
        card_url: Option<&str>,
    ) -> (Option<CapabilityDocument>, Resolution) {
        let Some(body) = self.network_phase(progress, target, card_url).await else {
            progress
                .complete(Section::with_findings(
                    SectionKind::Schema,
                    vec![CARD_STRUCT.skip("no card document to validate")],
                ))
                .await;
            progress
                .complete(Section::with_findings(
                    SectionKind::Card,
                    vec![CARD_SKIP.skip("card checks skipped without a document")],
                ))
                .await;
            return (None, Resolution::default());
        };

        progress.begin(SectionKind::Schema).await;
        let (doc, schema_findings) = validate_schema(self.schema.as_ref(), &body);
        progress.complete(Section::with_findings(SectionKind::Schema, schema_findings)).await;

        progress.begin(SectionKind::Card).await;
        let resolution = resolve(&doc);
        let mut card = Section::with_findings(SectionKind::Card, run_card_rules(&doc));
        card.extend(resolution.findings.iter().cloned());
        if !doc.schema_valid {
            card.mark_degraded();
        }
        progress.complete(card).await;

        (Some(doc), resolution)
    }

    fn jsonrpc_driver(&self, url: &str, options: DriverOptions) -> JsonRpcDriver {
        JsonRpcDriver::new(
            self.http.clone(),
            url,
            Arc::clone(&self.schema),
            self.streams,
            options,
        )
    }

    async fn jsonrpc_job(
        &self,
        progress: &Progress,
        doc: Option<&CapabilityDocument>,
        resolution: &Resolution,
        options: DriverOptions,
    ) -> BoxFuture<'static, Section> {
        let kind = SectionKind::JsonRpc;
        progress.begin(kind).await;
        if doc.is_some_and(|d| !d.schema_valid) {
            progress.degrade(kind).await;
        }

        let Some(binding) = resolution.binding_for(TransportKind::JsonRpc) else {
            let reason = if doc.is_some() {
                "card declares no JSON-RPC interface"
            } else {
                "no card document"
            };
            return futures::future::ready(Section::with_findings(kind, vec![RPC_URL.skip(reason)]))
                .boxed();
        };

        let driver = self.jsonrpc_driver(&binding.endpoint_url, options);
        let doc = doc.cloned();
        let task = SectionTask(tokio::spawn(async move { driver.run(doc.as_ref()).await }));
        join_section(kind, task).boxed()
    }

    async fn rest_job(
        &self,
        progress: &Progress,
        doc: Option<&CapabilityDocument>,
        resolution: &Resolution,
        options: DriverOptions,
    ) -> BoxFuture<'static, Section> {
        let kind = SectionKind::Rest;
        progress.begin(kind).await;
        if doc.is_some_and(|d| !d.schema_valid) {
            progress.degrade(kind).await;
        }

        let Some(binding) = resolution.binding_for(TransportKind::HttpJson) else {
            let reason = if doc.is_some() {
                "card declares no HTTP+JSON interface"
            } else {
                "no card document"
            };
            return futures::future::ready(Section::with_findings(kind, vec![REST_URL.skip(reason)]))
                .boxed();
        };

        let driver = RestDriver::new(
            self.http.clone(),
            &binding.endpoint_url,
            Arc::clone(&self.schema),
            self.streams,
            options,
        );
        let doc = doc.cloned();
        let task = SectionTask(tokio::spawn(async move { driver.run(doc.as_ref()).await }));
        join_section(kind, task).boxed()
    }
}

/// A spawned driver section, aborted when dropped.
struct SectionTask(JoinHandle<Section>);

impl Drop for SectionTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Await a driver section; a panic becomes one `INTERNAL` finding.
async fn join_section(kind: SectionKind, mut task: SectionTask) -> Section {
    match (&mut task.0).await {
        Ok(section) => section,
        Err(e) => {
            tracing::warn!(section = %kind, error = %e, "section task failed");
            let finding = Finding::internal(kind, format!("section task failed: {e}"));
            Section::with_findings(kind, vec![finding])
        }
    }
}

/// Sections of one operation, shared between the operation task and its
/// supervisor.
#[derive(Debug, Clone, Default)]
struct Progress(Arc<Mutex<Recorded>>);

#[derive(Debug, Default)]
struct Recorded {
    sections: Vec<Section>,
    completed: HashSet<SectionKind>,
}

impl Recorded {
    fn entry(&mut self, kind: SectionKind) -> &mut Section {
        let index = match self.sections.iter().position(|s| s.kind == kind) {
            Some(index) => index,
            None => {
                self.sections.push(Section::new(kind));
                self.sections.len() - 1
            }
        };
        &mut self.sections[index]
    }

    fn take(&mut self, kind: SectionKind) -> Option<Section> {
        let index = self.sections.iter().position(|s| s.kind == kind)?;
        Some(self.sections.remove(index))
    }
}

impl Progress {
    /// Mark a section as started.
    async fn begin(&self, kind: SectionKind) {
        self.0.lock().await.entry(kind);
    }

    async fn degrade(&self, kind: SectionKind) {
        self.0.lock().await.entry(kind).mark_degraded();
    }

    /// Append findings to a started section.
    async fn record(&self, kind: SectionKind, findings: impl IntoIterator<Item = Finding>) {
        self.0.lock().await.entry(kind).extend(findings);
    }

    /// Mark a section built through [`Progress::record`] as finished.
    async fn close(&self, kind: SectionKind) {
        let mut recorded = self.0.lock().await;
        recorded.entry(kind);
        recorded.completed.insert(kind);
    }

    /// Store a finished section, keeping a degraded mark set at `begin`.
    async fn complete(&self, mut section: Section) {
        let mut recorded = self.0.lock().await;
        let kind = section.kind;
        let entry = recorded.entry(kind);
        if entry.degraded {
            section.mark_degraded();
        }
        *entry = section;
        recorded.completed.insert(kind);
    }

    /// Assemble the report in `expected` order.
    async fn finish(&self, expected: &[SectionKind], fault: Option<&str>) -> Report {
        let mut recorded = self.0.lock().await;
        let mut report = Report::new();
        let mut faulted = false;

        for &kind in expected {
            let done = recorded.completed.contains(&kind);
            let section = recorded.take(kind);
            match (done, section, fault) {
                (true, Some(section), _) => report.push(section),
                (false, Some(mut section), Some(reason)) => {
                    section.push(Finding::internal(kind, reason));
                    faulted = true;
                    report.push(section);
                }
                (false, None, Some(reason)) if !faulted => {
                    faulted = true;
                    let finding = Finding::internal(kind, reason);
                    report.push(Section::with_findings(kind, vec![finding]));
                }
                (false, None, Some(reason)) => {
                    report.push(Section::with_findings(kind, vec![not_reached(kind, reason)]));
                }
                _ => {}
            }
        }
        report
    }
}

/// Skip row for a section the operation never started.
fn not_reached(kind: SectionKind, reason: &str) -> Finding {
    let rule = match kind {
        SectionKind::Network => NET_001,
        SectionKind::Schema => CARD_STRUCT,
        SectionKind::Card => CARD_SKIP,
        SectionKind::JsonRpc => RPC_URL,
        SectionKind::Rest => REST_URL,
    };
    rule.skip(format!("not reached: {reason}"))
}
