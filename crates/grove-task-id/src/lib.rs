use std::{borrow::Cow, fmt};

use serde::Serialize;

pub const TASK_DELIMITER: &str = "#";
/// Package name used for tasks that run in the repository root package
pub const ROOT_PKG_NAME: &str = "//";
/// Name of the phantom node every task graph hangs off of. It has no package
/// directory and never contributes to a hash.
pub const ROOT_NODE_NAME: &str = "___ROOT___";

/// A task identifier as it will appear in the task graph
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct TaskId<'a> {
    package: Cow<'a, str>,
    task: Cow<'a, str>,
}

#[derive(Debug, thiserror::Error)]
#[error("No package found in task id '{input}'")]
pub struct TaskIdError<'a> {
    input: &'a str,
}

/// A node in the task graph: either a real task or the virtual root.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaskNode {
    Root,
    Task(TaskId<'static>),
}

impl fmt::Display for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskNode::Root => f.write_str(ROOT_NODE_NAME),
            TaskNode::Task(task) => task.fmt(f),
        }
    }
}

impl From<TaskId<'static>> for TaskNode {
    fn from(value: TaskId<'static>) -> Self {
        if value.is_virtual_root() {
            TaskNode::Root
        } else {
            TaskNode::Task(value)
        }
    }
}

impl fmt::Display for TaskId<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!(
            "{}{TASK_DELIMITER}{}",
            self.package, self.task
        ))
    }
}

impl<'a> TaskId<'a> {
    pub fn new(package: &'a str, task: &'a str) -> Self {
        Self {
            package: package.into(),
            task: task.into(),
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    /// Tasks that belong to the virtual root rather than a real package
    pub fn is_virtual_root(&self) -> bool {
        self.package == ROOT_NODE_NAME
    }

    pub fn into_owned(self) -> TaskId<'static> {
        let TaskId { package, task } = self;
        TaskId {
            package: static_cow(package),
            task: static_cow(task),
        }
    }
}

impl TaskId<'static> {
    pub fn from_static(package: String, task: String) -> Self {
        TaskId {
            package: package.into(),
            task: task.into(),
        }
    }
}

impl<'a> TryFrom<&'a str> for TaskId<'a> {
    type Error = TaskIdError<'a>;

    fn try_from(value: &'a str) -> Result<Self, Self::Error> {
        // Split on the first delimiter only, `pkg#test#check` is the task
        // `test#check` in `pkg`
        match value.split_once(TASK_DELIMITER) {
            None | Some(("", _)) => Err(TaskIdError { input: value }),
            Some((package, task)) => Ok(TaskId {
                package: package.into(),
                task: task.into(),
            }),
        }
    }
}

// Utility method changing the lifetime of an owned cow to reflect that it is
// owned
fn static_cow<'a, T: 'a + ToOwned + ?Sized>(cow: Cow<'a, T>) -> Cow<'static, T> {
    match cow {
        Cow::Borrowed(x) => Cow::Owned(x.to_owned()),
        Cow::Owned(x) => Cow::Owned(x),
    }
}
