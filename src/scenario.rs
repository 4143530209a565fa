//! YAML scenarios - drive the engine from a file
//!
//! ```yaml
//! name: deferred item
//! modules:
//!   pkg: { X: 42 }
//! steps:
//!   - open_guard: {}
//!   - declare: { name: X, source: pkg, item: X }
//!   - close_guard:
//!   - lookup: { name: X, expect_error: LAZY-020 }
//!   - call:
//!       - lookup: { name: X, expect: 42 }
//!   - expect_calls: { source: pkg, item: X, count: 1 }
//! ```
//!
//! Every scenario runs against one global scope and a [`StaticLoader`]
//! filled from `modules:`. `on_load:` lists names a module looks up while
//! it is being loaded, which is how cyclic imports are expressed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::engine::Engine;
use crate::error::{BindError, LoadError, ScenarioError};
use crate::event_log::Event;
use crate::guard::{GuardHandle, GuardOptions};
use crate::ident::{validate_identifier, validate_module_path};
use crate::import_spec::{DeclarationSite, ImportSpec, Item, MODULE_ITEM};
use crate::loader::{FnLoader, Loader, PatchGuard, StaticLoader};
use crate::scope::{Scope, ScopeRef};
use crate::tracker::NoIntrospection;
use crate::value::Value;

// ═══════════════════════════════════════════
// FILE FORMAT
// ═══════════════════════════════════════════

/// A parsed scenario file
#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub config: EngineConfig,
    /// `false` simulates a host without call-boundary introspection
    #[serde(default = "default_true")]
    pub introspection: bool,
    #[serde(default)]
    pub modules: BTreeMap<String, Value>,
    #[serde(default)]
    pub on_load: BTreeMap<String, Vec<String>>,
    pub steps: Vec<Step>,
    #[serde(skip)]
    pub path: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_threads() -> usize {
    4
}

fn default_item() -> String {
    MODULE_ITEM.to_string()
}

/// One scenario step - serde picks the variant from its single key
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Step {
    OpenGuard { open_guard: OpenGuardStep },
    CloseGuard { close_guard: GuardRef },
    Declare { declare: DeclareStep },
    Alias { alias: AliasStep },
    Set { set: SetStep },
    Lookup { lookup: LookupStep },
    Call { call: Vec<Step> },
    Patch { patch: PatchStep },
    Unpatch { unpatch: () },
    ParallelLookup { parallel_lookup: ParallelLookupStep },
    ExpectCalls { expect_calls: ExpectCallsStep },
}

impl Step {
    pub fn label(&self) -> &'static str {
        match self {
            Step::OpenGuard { .. } => "open_guard",
            Step::CloseGuard { .. } => "close_guard",
            Step::Declare { .. } => "declare",
            Step::Alias { .. } => "alias",
            Step::Set { .. } => "set",
            Step::Lookup { .. } => "lookup",
            Step::Call { .. } => "call",
            Step::Patch { .. } => "patch",
            Step::Unpatch { .. } => "unpatch",
            Step::ParallelLookup { .. } => "parallel_lookup",
            Step::ExpectCalls { .. } => "expect_calls",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OpenGuardStep {
    pub label: Option<String>,
    /// Conditional guard; `false` opens nothing
    pub when: Option<bool>,
    pub prevent_eager: Option<bool>,
    pub type_only: bool,
    pub fallback: Option<Value>,
    pub expect_error: Option<String>,
}

impl OpenGuardStep {
    fn options(&self) -> GuardOptions {
        GuardOptions {
            prevent_eager: self.prevent_eager.unwrap_or(true),
            type_only: self.type_only,
            fallback: self.fallback.clone(),
        }
    }
}

/// `close_guard:` closes the innermost guard, `close_guard: outer` a labelled one
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum GuardRef {
    Label(String),
    Innermost(()),
}

#[derive(Debug, Deserialize)]
pub struct DeclareStep {
    pub name: String,
    pub source: String,
    /// Member name, `*module*` (default) or `*`
    #[serde(default = "default_item")]
    pub item: String,
    #[serde(default)]
    pub expect_error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AliasStep {
    pub name: String,
    pub target: String,
}

#[derive(Debug, Deserialize)]
pub struct SetStep {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Deserialize)]
pub struct LookupStep {
    pub name: String,
    #[serde(default)]
    pub expect: Option<Value>,
    /// Error code (`LAZY-020`) or a fragment of the message
    #[serde(default)]
    pub expect_error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PatchStep {
    pub source: String,
    pub item: String,
    pub value: Value,
}

#[derive(Debug, Deserialize)]
pub struct ParallelLookupStep {
    pub name: String,
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default)]
    pub expect: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ExpectCallsStep {
    pub source: String,
    #[serde(default = "default_item")]
    pub item: String,
    pub count: usize,
}

/// Outcome of a scenario run
#[derive(Debug, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    /// One human-readable line per executed step
    pub lines: Vec<String>,
    /// Final contents of the global scope
    pub bindings: Value,
    pub events: Vec<Event>,
}

// ═══════════════════════════════════════════
// LOADING
// ═══════════════════════════════════════════

impl Scenario {
    pub fn from_yaml(yaml: &str) -> Result<Self, ScenarioError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let yaml = std::fs::read_to_string(path)?;
        let mut scenario = Self::from_yaml(&yaml)?;
        scenario.path = Some(path.display().to_string());
        Ok(scenario)
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.path.as_deref())
            .unwrap_or("<scenario>")
    }

    /// Check every name and module path; returns the number of steps
    pub fn validate(&self) -> Result<usize, ScenarioError> {
        for (source, module) in &self.modules {
            validate_module_path(source)?;
            if !module.is_object() {
                return Err(ScenarioError::Expectation {
                    step: format!("modules.{source}"),
                    details: "a module must be a mapping of member names".into(),
                });
            }
        }
        for (source, names) in &self.on_load {
            validate_module_path(source)?;
            names.iter().try_for_each(|n| validate_identifier(n))?;
        }
        validate_steps(&self.steps)
    }
}

fn validate_steps(steps: &[Step]) -> Result<usize, ScenarioError> {
    let mut count = 0;
    for step in steps {
        count += 1;
        match step {
            Step::Declare { declare } => {
                validate_identifier(&declare.name)?;
                ImportSpec::new(declare.source.as_str(), Item::parse(&declare.item)?).validate()?;
            }
            Step::Alias { alias } => {
                validate_identifier(&alias.name)?;
                validate_identifier(&alias.target)?;
            }
            Step::Set { set } => validate_identifier(&set.name)?,
            Step::Lookup { lookup } => validate_identifier(&lookup.name)?,
            Step::ParallelLookup { parallel_lookup } => {
                validate_identifier(&parallel_lookup.name)?
            }
            Step::Patch { patch } => {
                validate_module_path(&patch.source)?;
                validate_identifier(&patch.item)?;
            }
            Step::Call { call } => count += validate_steps(call)?,
            Step::OpenGuard { .. }
            | Step::CloseGuard { .. }
            | Step::Unpatch { .. }
            | Step::ExpectCalls { .. } => {}
        }
    }
    Ok(count)
}

/// Scenario files under `path`: the file itself, or `*.yaml`/`*.yml` below a directory
pub fn discover(path: &Path) -> Vec<PathBuf> {
    if !path.is_dir() {
        return vec![path.to_path_buf()];
    }
    WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| {
            p.is_file()
                && matches!(
                    p.extension().and_then(|ext| ext.to_str()),
                    Some("yaml") | Some("yml")
                )
        })
        .collect()
}

// ═══════════════════════════════════════════
// EXECUTION
// ═══════════════════════════════════════════

/// Run every step; stops at the first unmet expectation
pub fn run(scenario: &Scenario) -> Result<ScenarioReport, ScenarioError> {
    let loader = StaticLoader::new();
    for (source, module) in &scenario.modules {
        loader.insert_module(source, module.clone());
    }
    let global = Scope::global("__main__");
    let engine = build_engine(scenario, &loader, &global);
    let cx = ExecutionContext::new(Arc::clone(&engine));

    debug!(scenario = scenario.display_name(), "running scenario");
    let mut runner = Runner {
        cx: &cx,
        scope: &global,
        loader: &loader,
        file: scenario.path.as_deref().unwrap_or("<scenario>"),
        guards: Vec::new(),
        patches: Vec::new(),
        lines: Vec::new(),
    };
    let outcome = runner.run_steps(&scenario.steps, "", 0);
    let lines = std::mem::take(&mut runner.lines);
    // Closes leftover guards and restores patches
    drop(runner);
    outcome?;

    Ok(ScenarioReport {
        name: scenario.display_name().to_string(),
        lines,
        bindings: global.to_value(),
        events: engine.events().events(),
    })
}

fn build_engine(scenario: &Scenario, loader: &StaticLoader, global: &ScopeRef) -> Arc<Engine> {
    let hooks = scenario.on_load.clone();
    let registry = loader.clone();
    let scope = Arc::clone(global);
    let loader = FnLoader::new(move |cx: &ExecutionContext, spec: &ImportSpec| {
        if let Some(names) = hooks.get(spec.source.as_ref()) {
            for name in names {
                cx.lookup(&scope, name).map_err(LoadError::from)?;
            }
        }
        registry.resolve(cx, spec)
    })
    .with_name("scenario");

    let builder = Engine::builder()
        .loader(loader)
        .config(scenario.config.clone());
    if scenario.introspection {
        builder.build()
    } else {
        builder.tracker(NoIntrospection).build()
    }
}

struct Runner<'a> {
    cx: &'a ExecutionContext,
    scope: &'a ScopeRef,
    loader: &'a StaticLoader,
    file: &'a str,
    guards: Vec<(Option<String>, GuardHandle<'a>)>,
    patches: Vec<PatchGuard>,
    lines: Vec<String>,
}

impl<'a> Runner<'a> {
    fn run_steps(&mut self, steps: &[Step], prefix: &str, line: u32) -> Result<(), ScenarioError> {
        for (i, step) in steps.iter().enumerate() {
            let id = if prefix.is_empty() {
                (i + 1).to_string()
            } else {
                format!("{}.{}", prefix, i + 1)
            };
            // Nested steps report the line of their top-level step
            let line = if prefix.is_empty() {
                u32::try_from(i + 1).unwrap_or(u32::MAX)
            } else {
                line
            };
            self.run_step(step, &id, line)?;
        }
        Ok(())
    }

    fn run_step(&mut self, step: &Step, id: &str, line: u32) -> Result<(), ScenarioError> {
        let label = format!("{} ({})", id, step.label());
        match step {
            Step::OpenGuard { open_guard } => self.open_guard(open_guard, &label)?,
            Step::CloseGuard { close_guard } => self.close_guard(close_guard, &label)?,
            Step::Declare { declare } => self.declare(declare, &label, line)?,
            Step::Alias { alias } => {
                self.cx.alias(self.scope, &alias.name, &alias.target)?;
                self.note(&label, format!("{} -> {}", alias.name, alias.target));
            }
            Step::Set { set } => {
                validate_identifier(&set.name)?;
                self.scope.set(&set.name, set.value.clone());
                self.note(&label, format!("{} = {}", set.name, set.value));
            }
            Step::Lookup { lookup } => {
                let result = self.cx.lookup(self.scope, &lookup.name);
                match expect_outcome(&label, result, lookup.expect_error.as_deref())? {
                    Ok(value) => {
                        check_value(&label, lookup.expect.as_ref(), &value)?;
                        self.note(&label, format!("{} = {}", lookup.name, value));
                    }
                    Err(err) => self.note(&label, format!("{} failed as expected: {}", lookup.name, err)),
                }
            }
            Step::Call { call } => {
                let cx = self.cx;
                let _frame = cx.enter_call();
                self.note(&label, format!("enter call, depth {}", cx.frames().depth()));
                self.run_steps(call, id, line)?;
            }
            Step::Patch { patch } => {
                let guard = self.loader.patch(&patch.source, &patch.item, patch.value.clone());
                self.patches.push(guard);
                self.note(
                    &label,
                    format!("{}.{} = {}", patch.source, patch.item, patch.value),
                );
            }
            Step::Unpatch { .. } => match self.patches.pop() {
                Some(guard) => {
                    guard.restore();
                    self.note(&label, "restored".to_string());
                }
                None => return Err(expectation(&label, "no active patch")),
            },
            Step::ParallelLookup { parallel_lookup } => self.parallel_lookup(parallel_lookup, &label)?,
            Step::ExpectCalls { expect_calls } => {
                let calls = self.loader.calls(&expect_calls.source, &expect_calls.item);
                if calls != expect_calls.count {
                    return Err(expectation(
                        &label,
                        format!(
                            "expected {} loader call(s) for {}:{}, got {}",
                            expect_calls.count, expect_calls.source, expect_calls.item, calls
                        ),
                    ));
                }
                self.note(
                    &label,
                    format!("{}:{} loaded {} time(s)", expect_calls.source, expect_calls.item, calls),
                );
            }
        }
        Ok(())
    }

    fn open_guard(&mut self, step: &OpenGuardStep, label: &str) -> Result<(), ScenarioError> {
        let cx = self.cx;
        let condition = step.when.unwrap_or(true);
        let result = cx.open_guard_if(condition, step.options());
        match expect_outcome(label, result, step.expect_error.as_deref())? {
            Ok(Some(handle)) => {
                self.note(label, format!("guard {} ({})", handle.id(), handle.mode().label()));
                self.guards.push((step.label.clone(), handle));
            }
            Ok(None) => self.note(label, "condition false, no guard".to_string()),
            Err(err) => self.note(label, format!("refused as expected: {}", err)),
        }
        Ok(())
    }

    fn close_guard(&mut self, which: &GuardRef, label: &str) -> Result<(), ScenarioError> {
        let position = match which {
            GuardRef::Innermost(()) => self.guards.len().checked_sub(1),
            GuardRef::Label(name) => self
                .guards
                .iter()
                .position(|(l, _)| l.as_deref() == Some(name.as_str())),
        };
        let Some(position) = position else {
            return Err(expectation(label, "no matching open guard"));
        };

        let (_, handle) = self.guards.remove(position);
        let id = handle.id();
        match handle.close() {
            Ok(()) => self.note(label, format!("guard {} closed", id)),
            // Interleaved close still removes the guard
            Err(err @ BindError::GuardOrder { .. }) => {
                self.note(label, format!("guard {} closed out of order: {}", id, err))
            }
            Err(err) => return Err(err.into()),
        }
        Ok(())
    }

    fn declare(&mut self, step: &DeclareStep, label: &str, line: u32) -> Result<(), ScenarioError> {
        let spec = ImportSpec::new(step.source.as_str(), Item::parse(&step.item)?);
        let site = DeclarationSite::new(self.file, line, 1);
        let result = self.cx.declare_at(self.scope, &step.name, spec.clone(), site);

        match expect_outcome(label, result, step.expect_error.as_deref())? {
            Ok(()) => match self.scope.sentinel(&step.name) {
                Some(sentinel) if sentinel.is_pending() => {
                    self.note(label, format!("{} deferred as {}", step.name, sentinel))
                }
                _ => self.note(label, format!("{} bound eagerly ({})", step.name, spec)),
            },
            Err(err) => self.note(label, format!("{} refused as expected: {}", step.name, err)),
        }
        Ok(())
    }

    fn parallel_lookup(&mut self, step: &ParallelLookupStep, label: &str) -> Result<(), ScenarioError> {
        let engine = self.cx.engine();
        let scope = self.scope;
        let name = step.name.as_str();

        let joined: Vec<thread::Result<Result<Value, BindError>>> = thread::scope(|s| {
            let handles: Vec<_> = (0..step.threads.max(1))
                .map(|_| {
                    s.spawn(move || {
                        let cx = ExecutionContext::new(Arc::clone(engine));
                        cx.call(|cx| cx.lookup(scope, name))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join()).collect()
        });

        let mut seen: Option<Value> = None;
        for result in joined {
            let value = result
                .map_err(|_| expectation(label, "lookup thread panicked"))??;
            check_value(label, step.expect.as_ref(), &value)?;
            if let Some(first) = &seen {
                if *first != value {
                    return Err(expectation(
                        label,
                        format!("threads disagree: {} vs {}", first, value),
                    ));
                }
            }
            seen = Some(value);
        }

        let value = seen.unwrap_or(Value::Null);
        self.note(
            label,
            format!("{} = {} on {} thread(s)", name, value, step.threads.max(1)),
        );
        Ok(())
    }

    fn note(&mut self, label: &str, text: String) {
        debug!(step = label, "{}", text);
        self.lines.push(format!("{}: {}", label, text));
    }
}

fn expectation(step: &str, details: impl Into<String>) -> ScenarioError {
    ScenarioError::Expectation {
        step: step.to_string(),
        details: details.into(),
    }
}

/// Match a result against an optional expected error.
/// The inner `Err` is an error the step expected.
fn expect_outcome<T>(
    label: &str,
    result: Result<T, BindError>,
    expected: Option<&str>,
) -> Result<Result<T, BindError>, ScenarioError> {
    match (result, expected) {
        (Ok(value), None) => Ok(Ok(value)),
        (Ok(_), Some(expected)) => Err(expectation(
            label,
            format!("expected error '{}', but the step succeeded", expected),
        )),
        (Err(err), Some(expected))
            if err.code() == expected || err.to_string().contains(expected) =>
        {
            Ok(Err(err))
        }
        (Err(err), Some(expected)) => Err(expectation(
            label,
            format!("expected error '{}', got: {}", expected, err),
        )),
        (Err(err), None) => Err(err.into()),
    }
}

fn check_value(label: &str, expected: Option<&Value>, actual: &Value) -> Result<(), ScenarioError> {
    match expected {
        Some(expected) if expected != actual => Err(expectation(
            label,
            format!("expected {}, got {}", expected, actual),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run_yaml(yaml: &str) -> Result<ScenarioReport, ScenarioError> {
        run(&Scenario::from_yaml(yaml).unwrap())
    }

    // ═══════════════════════════════════════════════════════════════
    // Parsing
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn parses_every_step_kind() {
        let scenario = Scenario::from_yaml(
            r#"
modules:
  pkg: { X: 1 }
steps:
  - open_guard: { label: outer, type_only: true }
  - declare: { name: X, source: pkg, item: X }
  - alias: { name: Y, target: X }
  - close_guard:
  - close_guard: outer
  - set: { name: z, value: [1, 2] }
  - patch: { source: pkg, item: X, value: 2 }
  - unpatch:
  - call:
      - lookup: { name: X, expect: 1 }
  - parallel_lookup: { name: X }
  - expect_calls: { source: pkg, item: X, count: 1 }
"#,
        )
        .unwrap();

        let labels: Vec<&str> = scenario.steps.iter().map(Step::label).collect();
        assert_eq!(
            labels,
            vec![
                "open_guard",
                "declare",
                "alias",
                "close_guard",
                "close_guard",
                "set",
                "patch",
                "unpatch",
                "call",
                "parallel_lookup",
                "expect_calls"
            ]
        );
        assert!(matches!(
            scenario.steps[3],
            Step::CloseGuard {
                close_guard: GuardRef::Innermost(())
            }
        ));
        assert_eq!(scenario.validate().unwrap(), 12);
    }

    #[test]
    fn validate_rejects_bad_identifier() {
        let scenario = Scenario::from_yaml(
            "steps:\n  - declare: { name: 1x, source: pkg }\n",
        )
        .unwrap();
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::Bind(BindError::InvalidIdentifier { .. }))
        ));
    }

    // ═══════════════════════════════════════════════════════════════
    // Execution
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn deferred_item_resolves_after_call_boundary() {
        let report = run_yaml(
            r#"
modules:
  pkg: { X: 42 }
steps:
  - open_guard: {}
  - declare: { name: X, source: pkg, item: X }
  - close_guard:
  - expect_calls: { source: pkg, item: X, count: 0 }
  - lookup: { name: X, expect_error: LAZY-020 }
  - call:
      - lookup: { name: X, expect: 42 }
  - lookup: { name: X, expect: 42 }
  - expect_calls: { source: pkg, item: X, count: 1 }
"#,
        )
        .unwrap();
        assert_eq!(report.bindings, json!({"X": 42}));
        assert!(report.lines[1].contains("deferred as <from pkg import X"));
    }

    #[test]
    fn unmet_expectation_fails_run() {
        let err = run_yaml(
            r#"
modules:
  pkg: { X: 1 }
steps:
  - declare: { name: X, source: pkg, item: X }
  - lookup: { name: X, expect: 2 }
"#,
        )
        .unwrap_err();
        match err {
            ScenarioError::Expectation { step, details } => {
                assert_eq!(step, "2 (lookup)");
                assert_eq!(details, "expected 2, got 1");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cyclic_module_reports_reentrancy() {
        let report = run_yaml(
            r#"
modules:
  cycle: { X: 1 }
on_load:
  cycle: [X]
steps:
  - open_guard: {}
  - declare: { name: X, source: cycle, item: X }
  - close_guard:
  - call:
      - lookup: { name: X, expect_error: LAZY-030 }
      - lookup: { name: X, expect_error: LAZY-030 }
  - expect_calls: { source: cycle, item: X, count: 0 }
"#,
        )
        .unwrap();
        assert!(report.lines.iter().any(|l| l.contains("Reentrant resolution")));
    }

    #[test]
    fn transitive_cycle_reports_reentrancy() {
        run_yaml(
            r#"
modules:
  a: { X: 1 }
  b: { Y: 2 }
on_load:
  a: [Y]
  b: [X]
steps:
  - open_guard: {}
  - declare: { name: X, source: a, item: X }
  - declare: { name: Y, source: b, item: Y }
  - close_guard:
  - call:
      - lookup: { name: X, expect_error: "LAZY-030: Reentrant resolution of 'X'" }
      - lookup: { name: Y, expect_error: LAZY-040 }
      - lookup: { name: X, expect_error: LAZY-030 }
  - expect_calls: { source: a, item: X, count: 0 }
  - expect_calls: { source: b, item: Y, count: 0 }
"#,
        )
        .unwrap();
    }

    #[test]
    fn missing_introspection_refuses_strict_guard() {
        run_yaml(
            r#"
introspection: false
modules:
  pkg: { X: 1 }
steps:
  - open_guard: { expect_error: LAZY-010 }
  - open_guard: { prevent_eager: false }
  - declare: { name: X, source: pkg, item: X }
  - close_guard:
  - lookup: { name: X, expect: 1 }
"#,
        )
        .unwrap();
    }

    #[test]
    fn site_points_at_scenario_step() {
        let mut scenario = Scenario::from_yaml(
            r#"
steps:
  - open_guard: {}
  - declare: { name: X, source: missing, item: X }
  - close_guard:
  - call:
      - lookup: { name: X, expect_error: "caught on deferred import from demo.yaml:2" }
"#,
        )
        .unwrap();
        scenario.path = Some("demo.yaml".into());
        run(&scenario).unwrap();
    }

    #[test]
    fn discover_filters_yaml_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.yaml"), "steps: []").unwrap();
        std::fs::write(dir.path().join("a.yml"), "steps: []").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let found = discover(dir.path());
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.yml", "b.yaml"]);
    }
}
