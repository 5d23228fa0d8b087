//! The `ifelse` transform.
//!
//! Both branches are compiled up front and read from one shared
//! [`InjectionPoint`]. For each input datapoint the condition picks a branch,
//! the datapoint is injected, and the picked branch is pulled for exactly one
//! output. At end of stream every branch is pulled once more with end of stream
//! injected, including branches that were never picked.

use crate::datapoint::{Datapoint, Value};
use crate::error::{PipelineError, PipelineResult};
use crate::iterator::{DatapointIterator, InjectionPoint};
use crate::script::Script;
use crate::transform::{
    GeneratedTransform, Transform, TransformArg, TransformInstance, TransformIterator,
};
use log::{debug, warn};

const THEN: usize = 0;
const ELSE: usize = 1;

struct IfElse {
    injection: InjectionPoint,
    branches: Vec<Script>,
    drained: bool,
}

impl IfElse {
    /// Binds every branch to a newly allocated injection point.
    fn new(mut branches: Vec<Script>) -> Self {
        let injection = InjectionPoint::new();
        for branch in branches.iter_mut() {
            branch.set_input(Box::new(injection.share()));
        }
        Self {
            injection,
            branches,
            drained: false,
        }
    }

    /// Runs one datapoint through the selected branch.
    fn route(&mut self, branch: usize, dp: Datapoint) -> PipelineResult<Option<Datapoint>> {
        let timestamp = dp.timestamp;
        self.injection.set(dp);
        let out = self.branches[branch].next();
        self.injection.clear();

        match out? {
            Some(dp) => Ok(Some(dp)),
            None => Err(PipelineError::iterator(format!(
                "ifelse branch ended without output for datapoint at {}",
                timestamp
            ))),
        }
    }

    /// Injects end of stream into every branch so buffered state is flushed.
    fn drain(&mut self) -> PipelineResult<()> {
        self.drained = true;
        for (index, branch) in self.branches.iter_mut().enumerate() {
            self.injection.finish();
            let out = branch.next();
            self.injection.clear();

            if let Some(dp) = out? {
                warn!(
                    "Discarding datapoint at {} emitted by ifelse branch {} at end of stream",
                    dp.timestamp, index
                );
            }
        }
        debug!("Drained {} ifelse branches", self.branches.len());
        Ok(())
    }
}

impl TransformInstance for IfElse {
    fn next(&mut self, iter: &mut TransformIterator) -> PipelineResult<Option<Datapoint>> {
        let env = iter.next();
        if env.error.is_some() {
            return env.get();
        }
        let Some(dp) = env.datapoint.clone() else {
            if !self.drained {
                self.drain()?;
            }
            return Ok(None);
        };

        let branch = if env.arg_bool(0)? { THEN } else { ELSE };
        self.route(branch, dp)
    }

    fn clone_instance(&self) -> Box<dyn TransformInstance> {
        Box::new(IfElse::new(self.branches.clone()))
    }

    fn input_reset(&mut self) {
        self.injection.clear();
        self.drained = false;
        for branch in self.branches.iter_mut() {
            branch.set_input(Box::new(self.injection.share()));
        }
    }
}

fn generate(name: &str, args: Vec<Script>) -> PipelineResult<GeneratedTransform> {
    let mut args = args.into_iter();
    let (Some(condition), Some(then_branch), Some(else_branch)) =
        (args.next(), args.next(), args.next())
    else {
        return Err(PipelineError::compile(
            name,
            "expected a condition and two branches",
        ));
    };

    if condition.is_peeking() {
        return Err(PipelineError::compile(
            name,
            "the condition must not look ahead in its input",
        ));
    }

    // An omitted else branch passes datapoints through unchanged.
    let else_branch = if else_branch.is_constant() && else_branch.get_constant()?.is_null() {
        Script::identity()
    } else {
        else_branch
    };

    for (label, branch) in [("then", &then_branch), ("else", &else_branch)] {
        if !branch.is_one_to_one() {
            return Err(PipelineError::compile(
                name,
                format!("the {} branch must be one-to-one", label),
            ));
        }
        if branch.is_peeking() {
            return Err(PipelineError::compile(
                name,
                format!("the {} branch must not look ahead in its input", label),
            ));
        }
    }

    let constant =
        condition.is_constant() && then_branch.is_constant() && else_branch.is_constant();
    let instance = IfElse::new(vec![then_branch, else_branch]);
    Ok(GeneratedTransform::new(Box::new(instance), vec![condition]).constant(constant))
}

pub fn descriptor() -> Transform {
    Transform::new(
        "ifelse",
        "Runs the first pipeline on datapoints where the condition is true and the second elsewhere",
    )
    .arg(TransformArg::required("Condition evaluated for each datapoint"))
    .arg(TransformArg::required("Pipeline run when the condition is true").hijacked())
    .arg(
        TransformArg::optional(
            "Pipeline run when the condition is false, passes datapoints through when omitted",
            Value::Null,
        )
        .hijacked(),
    )
    .one_to_one(true)
    .generator(generate)
}
