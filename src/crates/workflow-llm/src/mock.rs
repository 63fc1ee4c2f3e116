//! A deterministic gateway for tests: no network calls, scripted plans and step
//! results supplied up front.

use std::sync::Mutex;

use async_trait::async_trait;

use workflow_core::error::GraphError;
use workflow_core::llm::{LlmGateway, StepOutcome, TokenSink};
use workflow_core::types::{GraphState, Message, Plan, Step};
use workflow_registry::Tool;

pub struct MockGateway {
    plan: Plan,
    step_results: Mutex<Vec<StepOutcome>>,
}

impl MockGateway {
    /// `step_results` is consumed in order, one per `execute_step` call.
    pub fn new(plan: Plan, step_results: Vec<StepOutcome>) -> Self {
        Self {
            plan,
            step_results: Mutex::new(step_results),
        }
    }
}

#[async_trait]
impl LlmGateway for MockGateway {
    async fn plan(
        &self,
        _request: &str,
        _history: &[Message],
        _tools: &[Tool],
        _tokens: TokenSink,
    ) -> Result<Plan, GraphError> {
        Ok(self.plan.clone())
    }

    async fn execute_step(
        &self,
        _step: &Step,
        _state: &GraphState,
        _tools: &[Tool],
        _tokens: TokenSink,
    ) -> Result<StepOutcome, GraphError> {
        let mut results = self.step_results.lock().expect("mock gateway mutex poisoned");
        if results.is_empty() {
            return Err(GraphError::Execution("mock gateway ran out of scripted step results".to_string()));
        }
        Ok(results.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plan_returns_the_scripted_plan() {
        let plan = Plan::new("req", "rationale", vec![Step::new(1, "do it")]);
        let gateway = MockGateway::new(plan.clone(), vec![]);
        let result = gateway.plan("req", &[], &[], None).await.unwrap();
        assert_eq!(result.len(), plan.len());
    }

    #[tokio::test]
    async fn execute_step_drains_scripted_results_in_order() {
        let plan = Plan::new("req", "r", vec![Step::new(1, "a"), Step::new(2, "b")]);
        let gateway = MockGateway::new(
            plan.clone(),
            vec![
                StepOutcome { result_text: "first".to_string(), tool_outputs: None, rationale: "r".to_string() },
                StepOutcome { result_text: "second".to_string(), tool_outputs: None, rationale: "r".to_string() },
            ],
        );
        let registry = workflow_registry::ToolRegistry::build(&Default::default()).unwrap();
        let state = GraphState::fresh("t1", registry);

        let first = gateway.execute_step(&plan.steps[0], &state, &[], None).await.unwrap();
        assert_eq!(first.result_text, "first");
        let second = gateway.execute_step(&plan.steps[1], &state, &[], None).await.unwrap();
        assert_eq!(second.result_text, "second");
    }

    #[tokio::test]
    async fn execute_step_errors_once_results_are_exhausted() {
        let plan = Plan::new("req", "r", vec![Step::new(1, "a")]);
        let gateway = MockGateway::new(plan.clone(), vec![]);
        let registry = workflow_registry::ToolRegistry::build(&Default::default()).unwrap();
        let state = GraphState::fresh("t1", registry);

        assert!(gateway.execute_step(&plan.steps[0], &state, &[], None).await.is_err());
    }
}
