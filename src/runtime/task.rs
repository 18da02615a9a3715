//! Task identities and priorities.

use std::fmt;
use std::time::Duration;

/// Relative urgency of a long-lived task.
///
/// Ordered by timing criticality. The runtime spawns tasks highest first and
/// every task body is short and non-blocking, so on a single-threaded
/// executor a ready high-priority task is never stuck behind slow
/// lower-priority work. There is no preemption: a task only yields at its
/// queue, timer or event waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskPriority {
    /// Console output drain.
    ConsoleOutput = 0,
    /// Status indicator and console input on the robot.
    Status = 1,
    /// Heartbeat, liveness monitor and pairing broadcast.
    Periodic = 2,
    /// Inbound datagram processing.
    LinkWorker = 3,
    /// Fixed-rate command forwarding.
    CommandForwarding = 4,
}

impl TaskPriority {
    /// Numeric level, higher is more urgent.
    pub fn level(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}

/// A task in a node's fixed task set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSpec {
    /// Task name used in logs.
    pub name: &'static str,
    /// Scheduling priority.
    pub priority: TaskPriority,
    /// Wake period, for periodic tasks.
    pub period: Option<Duration>,
}

impl TaskSpec {
    /// Event-driven task.
    pub const fn event_driven(name: &'static str, priority: TaskPriority) -> Self {
        Self {
            name,
            priority,
            period: None,
        }
    }

    /// Periodic task.
    pub const fn periodic(name: &'static str, priority: TaskPriority, period: Duration) -> Self {
        Self {
            name,
            priority,
            period: Some(period),
        }
    }
}

/// Sort a task set highest priority first, keeping declaration order
/// within a level.
pub(crate) fn sort_by_priority<T>(tasks: &mut [(TaskSpec, T)]) {
    tasks.sort_by(|(a, _), (b, _)| b.priority.cmp(&a.priority));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        assert!(TaskPriority::CommandForwarding > TaskPriority::LinkWorker);
        assert!(TaskPriority::LinkWorker > TaskPriority::Periodic);
        assert!(TaskPriority::Periodic > TaskPriority::Status);
        assert!(TaskPriority::Status > TaskPriority::ConsoleOutput);
        assert_eq!(TaskPriority::CommandForwarding.level(), 4);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut tasks = vec![
            (TaskSpec::event_driven("console", TaskPriority::ConsoleOutput), ()),
            (TaskSpec::periodic("heartbeat", TaskPriority::Periodic, Duration::from_secs(5)), ()),
            (TaskSpec::event_driven("link", TaskPriority::LinkWorker), ()),
            (TaskSpec::periodic("monitor", TaskPriority::Periodic, Duration::from_secs(1)), ()),
        ];
        sort_by_priority(&mut tasks);
        let names: Vec<_> = tasks.iter().map(|(t, _)| t.name).collect();
        assert_eq!(names, ["link", "heartbeat", "monitor", "console"]);
    }
}
