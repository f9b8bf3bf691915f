//! Form-sync orchestrator: local form state plus the sequential
//! `update -> read -> calculate` chain against a [`RemoteStore`].

use std::{path::Path, sync::Arc};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    catalog,
    config::AppConfig,
    error::{SyncError, SyncResult, NON_POSITIVE_INPUT},
    format,
    remote::RemoteStore,
    state::{InputState, OutputState, UiStatus},
};

/// Behaviour switches for the submit chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Workbook named in the reconcile read; `None` reads the service default.
    pub read_file_path: Option<String>,
    /// Send the re-read inputs to `/calculate` instead of the submitted ones.
    pub calculate_with_reconciled_inputs: bool,
}

impl SyncOptions {
    /// Options taken from the application configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            read_file_path: config.read_file_path.clone(),
            calculate_with_reconciled_inputs: config.calculate_with_reconciled_inputs,
        }
    }
}

/// Point-in-time copy of the form for rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormSnapshot {
    /// Input parameters.
    pub inputs: InputState,
    /// Derived metrics.
    pub outputs: OutputState,
    /// Loading flag and last error.
    pub status: UiStatus,
}

#[derive(Debug, Default)]
struct Inner {
    inputs: InputState,
    outputs: OutputState,
    status: UiStatus,
}

/// Shared handle over the form state. Clones observe the same state, so a
/// UI can render while a chain runs on another task.
pub struct FormSync<S> {
    remote: Arc<S>,
    options: SyncOptions,
    inner: Arc<RwLock<Inner>>,
}

impl<S> Clone for FormSync<S> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
            options: self.options.clone(),
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Clears the loading flag when an operation ends, whichever way it ends.
struct LoadingGuard {
    inner: Arc<RwLock<Inner>>,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.inner.write().status.loading = false;
    }
}

impl<S: RemoteStore> FormSync<S> {
    /// New form with every value at zero.
    pub fn new(remote: S, options: SyncOptions) -> Self {
        Self::with_shared(Arc::new(remote), options)
    }

    /// New form over an already shared remote.
    pub fn with_shared(remote: Arc<S>, options: SyncOptions) -> Self {
        Self {
            remote,
            options,
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    /// Copy of inputs, outputs and status.
    pub fn snapshot(&self) -> FormSnapshot {
        let inner = self.inner.read();
        FormSnapshot {
            inputs: inner.inputs.clone(),
            outputs: inner.outputs.clone(),
            status: inner.status.clone(),
        }
    }

    /// Current status.
    pub fn status(&self) -> UiStatus {
        self.inner.read().status.clone()
    }

    /// True while a remote operation is in flight.
    pub fn is_loading(&self) -> bool {
        self.inner.read().status.loading
    }

    /// Parse `raw` and store it under `key`. Unparseable text stores `0.0`.
    pub fn set_input(&self, key: &str, raw: &str) -> SyncResult<f64> {
        if catalog::input_field(key).is_none() {
            return Err(SyncError::UnknownField(key.to_string()));
        }
        let value = format::parse_input(raw);
        self.inner.write().inputs.set(key, value);
        Ok(value)
    }

    /// Replace both states, e.g. from a saved scenario. Refused while loading.
    pub fn apply_snapshot(&self, inputs: InputState, outputs: OutputState) -> SyncResult<()> {
        let mut inner = self.inner.write();
        if inner.status.loading {
            return Err(SyncError::Busy);
        }
        inner.inputs = inputs;
        inner.outputs = outputs;
        inner.status.error = None;
        Ok(())
    }

    /// Load the persisted inputs and outputs from the remote store.
    pub async fn initialize_from_remote(&self) -> SyncResult<()> {
        let _guard = self.begin()?;
        let result = self.load_remote().await;
        self.settle("initialize", result)
    }

    /// Validate, persist, reconcile and derive, strictly in sequence.
    pub async fn submit_and_recalculate(&self) -> SyncResult<()> {
        let _guard = self.begin()?;
        let result = self.run_chain().await;
        self.settle("submit", result)
    }

    /// Upload a workbook file to the remote store.
    pub async fn upload_workbook(&self, path: &Path) -> SyncResult<()> {
        let _guard = self.begin()?;
        let result = self.upload(path).await;
        self.settle("upload", result)
    }

    fn begin(&self) -> SyncResult<LoadingGuard> {
        let mut inner = self.inner.write();
        if inner.status.loading {
            return Err(SyncError::Busy);
        }
        inner.status.loading = true;
        inner.status.error = None;
        Ok(LoadingGuard {
            inner: Arc::clone(&self.inner),
        })
    }

    fn settle(&self, operation: &'static str, result: SyncResult<()>) -> SyncResult<()> {
        match &result {
            Ok(()) => info!(operation, "Operation completed"),
            Err(err) => {
                warn!(operation, error = %err, "Operation failed");
                self.inner.write().status.error = Some(err.to_string());
            }
        }
        result
    }

    async fn load_remote(&self) -> SyncResult<()> {
        let response = self.remote.read(None).await?;
        let mut inner = self.inner.write();
        inner.inputs.merge(&response.input_data);
        if let Some(outputs) = response.output_data.as_ref() {
            inner.outputs.merge(outputs);
        }
        Ok(())
    }

    async fn run_chain(&self) -> SyncResult<()> {
        let submitted = self.inner.read().inputs.clone();
        if !submitted.all_positive() {
            return Err(SyncError::Validation(NON_POSITIVE_INPUT.to_string()));
        }

        info!("Persisting inputs");
        self.remote.update(&submitted).await?;

        info!(file_path = ?self.options.read_file_path, "Reading canonical state");
        let canonical = self
            .remote
            .read(self.options.read_file_path.as_deref())
            .await?;
        let reconciled = {
            let mut inner = self.inner.write();
            inner.inputs.merge(&canonical.input_data);
            inner.inputs.clone()
        };

        // Submitted values are used unless explicitly configured otherwise.
        let calculate_inputs = if self.options.calculate_with_reconciled_inputs {
            reconciled
        } else {
            submitted
        };
        info!(
            reconciled = self.options.calculate_with_reconciled_inputs,
            "Requesting derived outputs"
        );
        let derived = self.remote.calculate(&calculate_inputs).await?;
        self.inner.write().outputs.merge(&derived.data);
        Ok(())
    }

    async fn upload(&self, path: &Path) -> SyncResult<()> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "workbook.xlsx".to_string());
        let contents = tokio::fs::read(path).await?;
        info!(path = %path.display(), bytes = contents.len(), "Uploading workbook");
        self.remote.upload(&file_name, contents).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use async_trait::async_trait;
    use once_cell::sync::OnceCell;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    use super::*;
    use crate::{
        remote::{Acknowledgement, CalculateResponse, ReadResponse},
        state::RawFields,
    };

    type Probe = Box<dyn Fn() -> bool + Send + Sync>;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Upload(String),
        Update(InputState),
        Read(Option<String>),
        Calculate(InputState),
    }

    /// In-memory remote recording calls and the loading flag seen by each.
    #[derive(Default)]
    struct FakeRemote {
        calls: Mutex<Vec<Call>>,
        loading_seen: Mutex<Vec<bool>>,
        probe: OnceCell<Probe>,
        update_error: Option<(u16, &'static str)>,
        read_error: Option<(u16, &'static str)>,
        calculate_error: Option<(u16, &'static str)>,
        read_body: Value,
        calculate_body: Value,
    }

    impl FakeRemote {
        fn record(&self, call: Call) {
            let loading = self.probe.get().map(|probe| probe()).unwrap_or(false);
            self.loading_seen.lock().push(loading);
            self.calls.lock().push(call);
        }

        fn fail(failure: Option<(u16, &'static str)>) -> SyncResult<()> {
            match failure {
                Some((status, detail)) => Err(SyncError::Remote {
                    status,
                    detail: detail.to_string(),
                }),
                None => Ok(()),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl RemoteStore for FakeRemote {
        async fn upload(&self, file_name: &str, _contents: Vec<u8>) -> SyncResult<Acknowledgement> {
            self.record(Call::Upload(file_name.to_string()));
            Ok(Acknowledgement::default())
        }

        async fn update(&self, inputs: &InputState) -> SyncResult<Acknowledgement> {
            self.record(Call::Update(inputs.clone()));
            Self::fail(self.update_error)?;
            Ok(Acknowledgement::default())
        }

        async fn read(&self, file_path: Option<&str>) -> SyncResult<ReadResponse> {
            self.record(Call::Read(file_path.map(str::to_string)));
            Self::fail(self.read_error)?;
            Ok(serde_json::from_value(self.read_body.clone()).expect("read body fixture"))
        }

        async fn calculate(&self, inputs: &InputState) -> SyncResult<CalculateResponse> {
            self.record(Call::Calculate(inputs.clone()));
            Self::fail(self.calculate_error)?;
            Ok(serde_json::from_value(self.calculate_body.clone()).expect("calculate body fixture"))
        }
    }

    fn output_data() -> Value {
        json!({
            "exposicao_caixa": 250000.0,
            "meses_payback": 18.0,
            "corretagem_venda": 12000.0,
            "taxa_sucesso": 8000.0,
            "lucro_bruto": 90000.0,
            "ir_ganho_capital": 13500.0,
            "lucro_liquido": 76500.0,
            "roi": 30.6,
            "tir_mensal": 1.5
        })
    }

    fn input_data(operacao_total: f64) -> Value {
        let mut map = serde_json::Map::new();
        for (key, _) in InputState::new().iter() {
            map.insert(key.to_string(), json!(1.0));
        }
        map.insert("operacao_total".to_string(), json!(operacao_total));
        map.insert("financiamento".to_string(), json!(50.0));
        Value::Object(map)
    }

    fn fake() -> FakeRemote {
        FakeRemote {
            read_body: json!({ "inputData": input_data(100.0), "outputData": {} }),
            calculate_body: json!({ "data": output_data() }),
            ..FakeRemote::default()
        }
    }

    fn build(remote: FakeRemote, options: SyncOptions) -> (FormSync<FakeRemote>, Arc<FakeRemote>) {
        let remote = Arc::new(remote);
        let sync = FormSync::with_shared(Arc::clone(&remote), options);
        let watcher = sync.clone();
        let _ = remote.probe.set(Box::new(move || watcher.is_loading()));
        (sync, remote)
    }

    /// `{operacao_total: 100, financiamento: 50, others: 1}`.
    fn fill_valid(sync: &FormSync<FakeRemote>) {
        for field in catalog::INPUT_FIELDS.iter() {
            sync.set_input(field.key, "1").expect("catalog key");
        }
        sync.set_input("operacao_total", "100").expect("catalog key");
        sync.set_input("financiamento", "50").expect("catalog key");
    }

    #[test]
    fn set_input_coerces_garbage_to_zero() {
        let (sync, remote) = build(fake(), SyncOptions::default());
        assert_eq!(sync.set_input("preco_terreno", "abc").ok(), Some(0.0));
        assert_eq!(sync.snapshot().inputs.get("preco_terreno"), Some(0.0));
        assert_eq!(sync.set_input("preco_terreno", "R$ 2.500,00").ok(), Some(2500.0));
        assert!(matches!(
            sync.set_input("bogus", "1"),
            Err(SyncError::UnknownField(key)) if key == "bogus"
        ));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn non_positive_input_blocks_every_call() {
        let (sync, remote) = build(fake(), SyncOptions::default());
        fill_valid(&sync);
        sync.set_input("financiamento", "0").expect("catalog key");

        let err = sync
            .submit_and_recalculate()
            .await
            .expect_err("validation fails");
        assert!(matches!(err, SyncError::Validation(_)));
        let status = sync.status();
        assert_eq!(
            status.error.as_deref(),
            Some("All input values must be greater than 0.")
        );
        assert!(!status.loading);
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn successful_chain_replaces_outputs_with_calculated_data() {
        let (sync, remote) = build(fake(), SyncOptions::default());
        fill_valid(&sync);

        sync.submit_and_recalculate().await.expect("chain succeeds");

        let snapshot = sync.snapshot();
        let expected: RawFields = serde_json::from_value(output_data()).expect("fixture");
        for (key, value) in snapshot.outputs.iter() {
            assert_eq!(expected.get(key).and_then(Value::as_f64), Some(value), "{key}");
        }
        assert_eq!(snapshot.outputs.len(), expected.len());
        assert_eq!(snapshot.status, UiStatus::default());

        let calls = remote.calls();
        assert_eq!(calls.len(), 3);
        assert!(matches!(calls[0], Call::Update(_)));
        assert_eq!(calls[1], Call::Read(None));
        assert!(matches!(calls[2], Call::Calculate(_)));
        assert_eq!(*remote.loading_seen.lock(), vec![true, true, true]);
    }

    #[tokio::test]
    async fn read_failure_keeps_outputs_and_reports_detail() {
        let remote = FakeRemote {
            read_error: Some((400, "Unable to parse range: INPUTS!C7")),
            ..fake()
        };
        let (sync, remote) = build(remote, SyncOptions::default());
        fill_valid(&sync);
        let previous: RawFields = serde_json::from_value(json!({ "roi": 4.0 })).expect("fixture");
        sync.inner.write().outputs.merge(&previous);
        let before = sync.snapshot().outputs;

        let err = sync.submit_and_recalculate().await.expect_err("read fails");
        assert_eq!(err.to_string(), "Unable to parse range: INPUTS!C7");

        let snapshot = sync.snapshot();
        assert_eq!(snapshot.outputs, before);
        assert_eq!(
            snapshot.status.error.as_deref(),
            Some("Unable to parse range: INPUTS!C7")
        );
        assert!(!snapshot.status.loading);
        assert_eq!(remote.calls().len(), 2);
    }

    #[tokio::test]
    async fn calculate_failure_keeps_outputs_and_reports_detail() {
        let remote = FakeRemote {
            calculate_error: Some((500, "#REF! in FLUXO AUTOMATICO!E10")),
            read_body: json!({ "inputData": input_data(250.0) }),
            ..fake()
        };
        let (sync, remote) = build(remote, SyncOptions::default());
        fill_valid(&sync);
        let previous: RawFields =
            serde_json::from_value(json!({ "roi": 4.0, "lucro_liquido": 1200.0 }))
                .expect("fixture");
        sync.inner.write().outputs.merge(&previous);
        let before = sync.snapshot().outputs;

        let err = sync
            .submit_and_recalculate()
            .await
            .expect_err("calculate fails");
        assert!(matches!(err, SyncError::Remote { status: 500, .. }));

        let snapshot = sync.snapshot();
        assert_eq!(snapshot.outputs, before);
        assert_eq!(snapshot.inputs.get("operacao_total"), Some(250.0));
        assert_eq!(
            snapshot.status.error.as_deref(),
            Some("#REF! in FLUXO AUTOMATICO!E10")
        );
        assert!(!snapshot.status.loading);

        let calls = remote.calls();
        assert_eq!(calls.len(), 3);
        assert!(matches!(calls[2], Call::Calculate(_)));
    }

    #[tokio::test]
    async fn update_failure_stops_before_read() {
        let remote = FakeRemote {
            update_error: Some((400, "taxa_performance must be between 0 and 100")),
            ..fake()
        };
        let (sync, remote) = build(remote, SyncOptions::default());
        fill_valid(&sync);

        assert!(sync.submit_and_recalculate().await.is_err());
        assert_eq!(remote.calls().len(), 1);
        assert!(!sync.is_loading());
    }

    #[tokio::test]
    async fn calculate_uses_submitted_inputs_by_default() {
        let remote = FakeRemote {
            read_body: json!({ "inputData": input_data(999.0) }),
            ..fake()
        };
        let options = SyncOptions {
            read_file_path: Some("BUSINESS PLAN - BWI.xlsx".to_string()),
            calculate_with_reconciled_inputs: false,
        };
        let (sync, remote) = build(remote, options);
        fill_valid(&sync);

        sync.submit_and_recalculate().await.expect("chain succeeds");

        let calls = remote.calls();
        assert_eq!(
            calls[1],
            Call::Read(Some("BUSINESS PLAN - BWI.xlsx".to_string()))
        );
        match &calls[2] {
            Call::Calculate(inputs) => assert_eq!(inputs.get("operacao_total"), Some(100.0)),
            other => panic!("unexpected call {other:?}"),
        }
        assert_eq!(sync.snapshot().inputs.get("operacao_total"), Some(999.0));
    }

    #[tokio::test]
    async fn calculate_can_use_reconciled_inputs() {
        let remote = FakeRemote {
            read_body: json!({ "inputData": input_data(999.0) }),
            ..fake()
        };
        let options = SyncOptions {
            read_file_path: None,
            calculate_with_reconciled_inputs: true,
        };
        let (sync, remote) = build(remote, options);
        fill_valid(&sync);

        sync.submit_and_recalculate().await.expect("chain succeeds");

        match &remote.calls()[2] {
            Call::Calculate(inputs) => assert_eq!(inputs.get("operacao_total"), Some(999.0)),
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[tokio::test]
    async fn in_flight_operation_rejects_second_trigger() {
        let (sync, remote) = build(fake(), SyncOptions::default());
        fill_valid(&sync);

        let guard = sync.begin().expect("first operation starts");
        assert!(matches!(
            sync.submit_and_recalculate().await,
            Err(SyncError::Busy)
        ));
        assert!(matches!(
            sync.initialize_from_remote().await,
            Err(SyncError::Busy)
        ));
        assert!(sync.is_loading());
        assert_eq!(sync.status().error, None);
        assert!(remote.calls().is_empty());

        drop(guard);
        assert!(!sync.is_loading());
        sync.submit_and_recalculate().await.expect("runs once idle");
    }

    #[tokio::test]
    async fn initialize_merges_partial_remote_state() {
        let remote = FakeRemote {
            read_body: json!({
                "inputData": { "operacao_total": 100.0, "corretagem": "6%" },
                "outputData": { "roi": 22.0 }
            }),
            ..fake()
        };
        let (sync, remote) = build(remote, SyncOptions::default());
        sync.set_input("financiamento", "50").expect("catalog key");

        sync.initialize_from_remote().await.expect("read succeeds");

        let snapshot = sync.snapshot();
        assert_eq!(snapshot.inputs.get("operacao_total"), Some(100.0));
        assert_eq!(snapshot.inputs.get("corretagem"), Some(6.0));
        assert_eq!(snapshot.inputs.get("financiamento"), Some(0.0));
        assert_eq!(snapshot.inputs.len(), 12);
        assert_eq!(snapshot.outputs.get("roi"), Some(22.0));
        assert_eq!(snapshot.outputs.get("tir_mensal"), Some(0.0));
        assert_eq!(remote.calls(), vec![Call::Read(None)]);
        assert_eq!(*remote.loading_seen.lock(), vec![true]);
        assert!(!snapshot.status.loading);
    }

    #[tokio::test]
    async fn initialize_failure_leaves_state_untouched() {
        let remote = FakeRemote {
            read_error: Some((500, "credentials missing")),
            ..fake()
        };
        let (sync, _remote) = build(remote, SyncOptions::default());
        fill_valid(&sync);
        let before = sync.snapshot();

        assert!(sync.initialize_from_remote().await.is_err());

        let after = sync.snapshot();
        assert_eq!(after.inputs, before.inputs);
        assert_eq!(after.outputs, before.outputs);
        assert_eq!(after.status.error.as_deref(), Some("credentials missing"));
        assert!(!after.status.loading);
    }

    #[tokio::test]
    async fn upload_sends_file_name_and_reports_missing_files() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("plan.xlsx");
        fs::write(&path, b"PK\x03\x04")?;
        let (sync, remote) = build(fake(), SyncOptions::default());

        sync.upload_workbook(&path).await?;
        assert_eq!(remote.calls(), vec![Call::Upload("plan.xlsx".to_string())]);

        let missing = sync.upload_workbook(&dir.path().join("nope.xlsx")).await;
        assert!(matches!(missing, Err(SyncError::Io(_))));
        assert!(sync.status().error.is_some());
        assert!(!sync.is_loading());
        Ok(())
    }

    #[test]
    fn scenario_snapshot_is_refused_while_loading() {
        let (sync, _remote) = build(fake(), SyncOptions::default());
        let guard = sync.begin().expect("operation starts");
        assert!(matches!(
            sync.apply_snapshot(InputState::new(), OutputState::new()),
            Err(SyncError::Busy)
        ));
        drop(guard);

        let mut inputs = InputState::new();
        inputs.set("corretagem", 6.0);
        sync.apply_snapshot(inputs.clone(), OutputState::new())
            .expect("idle form accepts snapshot");
        assert_eq!(sync.snapshot().inputs, inputs);
    }
}
