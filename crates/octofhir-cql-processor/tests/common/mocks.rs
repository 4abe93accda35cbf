//! Mock evaluation engine for testing
//!
//! `MockEngine` evaluates expressions from Rust closures registered by name,
//! walking the patient cursor the way a real engine does, and records every
//! binding and call for later inspection.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use octofhir_cql_processor::{
    CqlExecutor, EngineError, EngineResult, EvaluationEngine, ExecutionDateTime, ExecutionResults,
    ExecutorBinding, MessageListener, Parameters, PatientRecord, PatientSource, Severity,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

/// Inputs available to a mock expression
pub struct MockContext<'a> {
    pub patient: PatientRecord<'a>,
    pub today: NaiveDate,
    pub parameters: Option<&'a Parameters>,
}

pub type MockExpression = Arc<dyn Fn(&MockContext<'_>) -> EngineResult<Value> + Send + Sync>;

/// What the engine saw when a library was bound
#[derive(Debug, Clone)]
pub struct BindingRecord {
    pub library: String,
    pub repository: Vec<(String, Option<String>)>,
    pub value_set_count: usize,
    pub parameters: Option<Parameters>,
    pub has_listener: bool,
}

/// One executor call
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    /// `None` for whole-library execution
    pub expression: Option<String>,
    pub at: Option<String>,
    /// Patients visited, in cursor order
    pub patients: Vec<String>,
}

#[derive(Default)]
struct MockState {
    bindings: Vec<BindingRecord>,
    calls: Vec<CallRecord>,
}

/// Scriptable engine
#[derive(Clone, Default)]
pub struct MockEngine {
    expressions: Arc<Mutex<Vec<(String, MockExpression)>>>,
    state: Arc<Mutex<MockState>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine that knows the `AgeCheck` expressions
    pub fn age_check() -> Self {
        let engine = Self::new();
        engine.define("Patient", |ctx| {
            Ok(ctx.patient.patient().cloned().unwrap_or(Value::Null))
        });
        engine.define("Age", |ctx| Ok(age(ctx).map(Value::from).unwrap_or(Value::Null)));
        engine.define("Is18OrOlder", |ctx| {
            let minimum = ctx
                .parameters
                .and_then(|p| p.get("MinimumAge"))
                .and_then(Value::as_i64)
                .unwrap_or(18);
            Ok(age(ctx).map(|age| json!(i64::from(age) >= minimum)).unwrap_or(Value::Null))
        });
        engine.define("ConditionCount", |ctx| {
            Ok(json!(ctx.patient.find_records("Condition").len()))
        });
        engine
    }

    /// Register an expression
    pub fn define<F>(&self, name: &str, expression: F)
    where
        F: Fn(&MockContext<'_>) -> EngineResult<Value> + Send + Sync + 'static,
    {
        self.expressions
            .lock()
            .push((name.to_string(), Arc::new(expression)));
    }

    pub fn bindings(&self) -> Vec<BindingRecord> {
        self.state.lock().bindings.clone()
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }
}

impl EvaluationEngine for MockEngine {
    fn bind(&self, binding: ExecutorBinding) -> EngineResult<Box<dyn CqlExecutor>> {
        if let Some(include) = binding.repository.unresolved_includes(&binding.library).first() {
            return Err(EngineError::unresolved_library(
                include.path.clone(),
                include.version.as_deref(),
            ));
        }

        self.state.lock().bindings.push(BindingRecord {
            library: binding.library.name().to_string(),
            repository: binding
                .repository
                .iter()
                .map(|(name, lib)| (name.to_string(), lib.version().map(str::to_string)))
                .collect(),
            value_set_count: binding.value_sets.len(),
            parameters: binding.parameters.clone(),
            has_listener: binding.listener.is_some(),
        });

        let expressions = self.expressions.lock().clone();
        Ok(Box::new(MockExecutor {
            expressions,
            statements: binding
                .library
                .statement_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            parameters: binding.parameters,
            listener: binding.listener,
            state: self.state.clone(),
        }))
    }
}

struct MockExecutor {
    expressions: Vec<(String, MockExpression)>,
    statements: Vec<String>,
    parameters: Option<Parameters>,
    listener: Option<Arc<dyn MessageListener>>,
    state: Arc<Mutex<MockState>>,
}

impl MockExecutor {
    fn lookup(&self, name: &str) -> EngineResult<&MockExpression> {
        if !self.statements.iter().any(|s| s == name) {
            return Err(EngineError::undefined_expression(name));
        }
        self.expressions
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, expr)| expr)
            .ok_or_else(|| EngineError::evaluation(format!("no implementation for {}", name)))
    }

    /// Evaluate `names` for every patient from the cursor onwards
    fn walk(
        &self,
        names: &[&str],
        source: &mut dyn PatientSource,
        at: Option<&ExecutionDateTime>,
    ) -> EngineResult<(ExecutionResults, Vec<String>)> {
        let today = at.map(ExecutionDateTime::date).unwrap_or_else(|| Utc::now().date_naive());
        let mut results = ExecutionResults::new();
        let mut visited = Vec::new();

        while let Some(patient) = source.current_patient() {
            let id = patient.id().unwrap_or_default().to_string();
            let ctx = MockContext {
                patient,
                today,
                parameters: self.parameters.as_ref(),
            };

            for name in names {
                let value = (self.lookup(name)?)(&ctx)?;
                if let Some(listener) = &self.listener {
                    let resource = patient.patient().cloned().unwrap_or(Value::Null);
                    listener.on_message(&resource, name, Severity::Trace, &format!("{} = {}", name, value));
                }
                results.insert(id.clone(), *name, value);
            }

            visited.push(id);
            source.next_patient();
        }

        Ok((results, visited))
    }

    fn record(&self, expression: Option<&str>, at: Option<&ExecutionDateTime>, patients: Vec<String>) {
        self.state.lock().calls.push(CallRecord {
            expression: expression.map(str::to_string),
            at: at.map(ToString::to_string),
            patients,
        });
    }
}

#[async_trait]
impl CqlExecutor for MockExecutor {
    async fn exec(
        &self,
        source: &mut dyn PatientSource,
        at: Option<&ExecutionDateTime>,
    ) -> EngineResult<ExecutionResults> {
        let names: Vec<&str> = self
            .statements
            .iter()
            .map(String::as_str)
            .filter(|name| self.expressions.iter().any(|(n, _)| n == name))
            .collect();

        let walked = self.walk(&names, source, at);
        // The whole-library entry point leaves the cursor where it found it.
        source.rewind();

        let (results, visited) = walked?;
        self.record(None, at, visited);
        Ok(results)
    }

    async fn exec_expression(
        &self,
        expression: &str,
        source: &mut dyn PatientSource,
        at: Option<&ExecutionDateTime>,
    ) -> EngineResult<ExecutionResults> {
        let (results, visited) = self.walk(&[expression], source, at)?;
        self.record(Some(expression), at, visited);
        Ok(results)
    }
}

fn age(ctx: &MockContext<'_>) -> Option<i32> {
    let birth_date = ctx.patient.patient()?.get("birthDate")?.as_str()?;
    let birth_date = NaiveDate::parse_from_str(birth_date, "%Y-%m-%d").ok()?;
    let mut age = ctx.today.year() - birth_date.year();
    if (ctx.today.month(), ctx.today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    Some(age)
}

/// Listener that only counts messages per code
#[derive(Default)]
pub struct CountingListener {
    counts: Mutex<HashMap<String, usize>>,
}

impl CountingListener {
    pub fn count(&self, code: &str) -> usize {
        self.counts.lock().get(code).copied().unwrap_or(0)
    }
}

impl MessageListener for CountingListener {
    fn on_message(&self, _source: &Value, code: &str, _severity: Severity, _message: &str) {
        *self.counts.lock().entry(code.to_string()).or_default() += 1;
    }
}
