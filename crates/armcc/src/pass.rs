//! The pass manager: a fixed, ordered pipeline over a `Module` (spec
//! §4.2). Two pass shapes cover everything the pipeline needs:
//! [`ModulePass`] sees the whole module (declares globals, rewrites
//! function signatures), [`FunctionPass`] is handed one function plus a
//! read-only view of the module's type tables.

use log::debug;

use crate::ir::{Function, Module, TypeCtx};
use crate::result::CoreResult;

/// Flags threaded through every pass invocation (spec §4.2
/// `PassRunInformation`).
#[derive(Clone, Copy, Debug, Default)]
pub struct PassRunInformation {
    /// Emit a `trace!`-level log line for every rewrite a pass performs,
    /// instead of only its entry/exit.
    pub test_trace: bool,
}

pub trait ModulePass {
    fn name(&self) -> &'static str;
    fn run(&mut self, module: &mut Module, info: PassRunInformation) -> CoreResult<()>;
}

pub trait FunctionPass {
    fn name(&self) -> &'static str;
    fn run(&mut self, ctx: TypeCtx<'_>, func: &mut Function, info: PassRunInformation) -> CoreResult<()>;
}

/// Run `pass` over every function in `module`, one `with_function_mut`
/// split-borrow at a time.
pub fn run_function_pass<P: FunctionPass>(
    module: &mut Module,
    pass: &mut P,
    info: PassRunInformation,
) -> CoreResult<()> {
    let refs: Vec<_> = module.functions().collect();
    for r in refs {
        module.with_function_mut(r, |ctx, func| pass.run(ctx, func, info))?;
    }
    Ok(())
}

/// Options controlling one run of [`run_pipeline`] (spec §6 CLI surface,
/// restricted to what the core itself consumes — `-D<macro>` and source
/// file selection are the front-end's concern).
#[derive(Clone, Debug, Default)]
pub struct PipelineOptions {
    /// Dump the module's text IR (spec §6) after the named pass runs.
    pub emit_ir_post: Option<String>,
    pub info: PassRunInformation,
}

/// Run the fixed fifteen-stage pipeline (spec §4.2) over `module` in
/// place. Stops at the first error, per spec §7's "report the first
/// error... no partial artefacts are written" policy — callers should
/// discard `module` on `Err`.
pub fn run_pipeline(module: &mut Module, options: &PipelineOptions) -> CoreResult<()> {
    use crate::genlower;
    use crate::isa::arm::{matcher, split_constants};
    use crate::legalize::{generic_legalizer, legalize_structs, lower_struct_alloc};
    use crate::opt::{constant_hoisting, dce, mem2reg, peephole, return_combine, scp};
    use crate::{abi, regalloc, verify};

    run_stage("validate", module, options, |m| verify::validate(m))?;
    run_stage("genlegal", module, options, |m| generic_legalizer::run(m, options.info))?;
    run_stage("structslegal", module, options, |m| {
        run_function_pass(m, &mut legalize_structs::LegaliseStructs, options.info)
    })?;
    run_stage("lowerallocastructs", module, options, |m| lower_struct_alloc::run(m))?;
    run_stage("mem2reg", module, options, |m| {
        run_function_pass(m, &mut mem2reg::Mem2Reg, options.info)
    })?;
    run_stage("scp", module, options, |m| scp::run(m))?;
    run_stage("dce", module, options, |m| run_function_pass(m, &mut dce::Dce, options.info))?;
    run_stage("peepholegeneric", module, options, |m| peephole::run(m))?;
    run_stage("retcomb", module, options, |m| {
        run_function_pass(m, &mut return_combine::ReturnCombine, options.info)
    })?;
    run_stage("genlower", module, options, |m| genlower::run(m))?;
    run_stage("constanthoisting", module, options, |m| constant_hoisting::run(m))?;
    run_stage("cconv", module, options, |m| abi::run(m))?;
    run_stage("match", module, options, |m| matcher::run(m))?;
    run_stage("armsplitconstants", module, options, |m| {
        run_function_pass(m, &mut split_constants::ArmSplitConstants, options.info)
    })?;
    run_stage("regalloc", module, options, |m| {
        run_function_pass(m, &mut regalloc::linear_scan::LinearScan::default(), options.info)
    })?;

    Ok(())
}

fn run_stage(
    name: &'static str,
    module: &mut Module,
    options: &PipelineOptions,
    mut f: impl FnMut(&mut Module) -> CoreResult<()>,
) -> CoreResult<()> {
    debug!("pipeline: running {name}");
    f(module)?;
    if options.emit_ir_post.as_deref() == Some(name) {
        log::info!("--- IR after {name} ---\n{}", crate::write::write_module(module));
    }
    Ok(())
}
