use crate::domain::models::{Action, AgentInvocation, ExecutionScope, InitPlanningContext, Topology};

/// Planning policy: decides which agents run next.
///
/// Planners only compute over in-memory state, so the contract is
/// synchronous. The orchestrator calls `init` once, then `first_action`,
/// then `next_action` after every completed invocation until it gets
/// [`Action::Done`].
pub trait Planner: Send {
    fn init(&mut self, _context: InitPlanningContext<'_>) {}

    fn first_action(&mut self, scope: &mut ExecutionScope) -> Action;

    fn next_action(&mut self, scope: &mut ExecutionScope, last: &AgentInvocation) -> Action;

    fn topology(&self) -> Topology {
        Topology::Sequential
    }

    fn terminated(&self) -> bool {
        false
    }
}

impl<P: Planner + ?Sized> Planner for Box<P> {
    fn init(&mut self, context: InitPlanningContext<'_>) {
        (**self).init(context);
    }

    fn first_action(&mut self, scope: &mut ExecutionScope) -> Action {
        (**self).first_action(scope)
    }

    fn next_action(&mut self, scope: &mut ExecutionScope, last: &AgentInvocation) -> Action {
        (**self).next_action(scope, last)
    }

    fn topology(&self) -> Topology {
        (**self).topology()
    }

    fn terminated(&self) -> bool {
        (**self).terminated()
    }
}
