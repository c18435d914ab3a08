//! Ordered task lists run over a mutable context.
//!
//! A [`Pipeline`] holds three phases, `before`, `core` and `after`. The
//! engine fills `before` and the tail of `after` with its own tasks and
//! formats splice theirs into `core` and the head of `after`, so the
//! engine's steps keep their order whatever a format adds.

use std::borrow::Cow;
use std::fmt;

use crate::error::Result;

/// The operation a pipeline run belongs to, reported with progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Parse,
    ReadItems,
    Unzip,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Parse => "parse",
            Action::ReadItems => "readItems",
            Action::Unzip => "unzip",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reported after each completed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// 1-based number of the task that just finished.
    pub step: usize,
    pub total: usize,
    pub action: Action,
}

/// Where a task sits in a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Before,
    Core,
    After,
}

type TaskFn<C> = Box<dyn Fn(C) -> Result<C>>;

/// A named stage: takes the context and returns it for the next stage.
pub struct Task<C> {
    name: Cow<'static, str>,
    fun: TaskFn<C>,
}

impl<C> Task<C> {
    pub fn new(name: impl Into<Cow<'static, str>>, fun: impl Fn(C) -> Result<C> + 'static) -> Self {
        Self {
            name: name.into(),
            fun: Box::new(fun),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, context: C) -> Result<C> {
        (self.fun)(context)
    }
}

impl<C> fmt::Debug for Task<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Task").field(&self.name).finish()
    }
}

pub struct Pipeline<C> {
    before: Vec<Task<C>>,
    core: Vec<Task<C>>,
    after: Vec<Task<C>>,
}

impl<C> Default for Pipeline<C> {
    fn default() -> Self {
        Self {
            before: Vec::new(),
            core: Vec::new(),
            after: Vec::new(),
        }
    }
}

impl<C> fmt::Debug for Pipeline<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl<C> Pipeline<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, phase: Phase, task: Task<C>) -> Self {
        self.phase_mut(phase).push(task);
        self
    }

    pub fn extend(mut self, phase: Phase, tasks: impl IntoIterator<Item = Task<C>>) -> Self {
        self.phase_mut(phase).extend(tasks);
        self
    }

    fn phase_mut(&mut self, phase: Phase) -> &mut Vec<Task<C>> {
        match phase {
            Phase::Before => &mut self.before,
            Phase::Core => &mut self.core,
            Phase::After => &mut self.after,
        }
    }

    pub fn len(&self) -> usize {
        self.before.len() + self.core.len() + self.after.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tasks in execution order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task<C>> {
        self.before.iter().chain(&self.core).chain(&self.after)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tasks().map(Task::name).collect()
    }

    /// Run every task in order, threading `context` through them.
    ///
    /// The first failing task ends the run and its error is returned as is.
    pub fn run(
        &self,
        mut context: C,
        action: Action,
        mut progress: Option<&mut dyn FnMut(Progress)>,
    ) -> Result<C> {
        let total = self.len();
        for (i, task) in self.tasks().enumerate() {
            tracing::trace!(task = task.name(), step = i + 1, total, %action, "running task");
            context = task.call(context)?;
            if let Some(report) = progress.as_deref_mut() {
                report(Progress {
                    step: i + 1,
                    total,
                    action,
                });
            }
        }
        Ok(context)
    }
}
