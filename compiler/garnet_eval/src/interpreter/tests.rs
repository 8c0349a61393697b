use super::*;
use crate::config::RuntimeConfig;
use crate::errors::EvalErrorKind;
use garnet_ir::{InstructionSource, LoweredBody, LoweringError, PreparedBody};
use pretty_assertions::assert_eq;
use std::panic::{catch_unwind, AssertUnwindSafe};

fn scope(kind: ScopeKind, name: &str, line: u32, body: PreparedBody) -> Arc<IrScope> {
    Arc::new(IrScope::new(kind, name, "app.rb", line, Arc::new(body)))
}

fn class(name: &str, line: u32, instrs: Vec<Instr>) -> Arc<IrScope> {
    scope(ScopeKind::ClassBody, name, line, PreparedBody::new(instrs))
}

fn module(name: &str, line: u32, instrs: Vec<Instr>) -> Arc<IrScope> {
    scope(ScopeKind::ModuleBody, name, line, PreparedBody::new(instrs))
}

/// Top-level harness: one interpreter, one body method for the outermost
/// definition.
struct Program {
    interpreter: Arc<Interpreter>,
    top: BodyMethod,
}

impl Program {
    fn new(top: Arc<IrScope>) -> Self {
        let interpreter = Arc::new(Interpreter::new());
        let engine = SharedEngine::from(Arc::clone(&interpreter));
        let kind = if top.kind() == ScopeKind::ModuleBody {
            ModuleKind::Module
        } else {
            ModuleKind::Class
        };
        let owner = ModuleRef::new(top.name(), kind);
        Program {
            interpreter,
            top: BodyMethod::new(top, owner, engine),
        }
    }

    fn run(&self, ctx: &mut CallContext) -> EvalResult {
        let owner = self.top.implementation_class().clone();
        let recv = Value::Module(owner.clone());
        ctx.set_line(1);
        self.top
            .call0(ctx, CallInfo::new(&recv, &owner, self.top.name()))
    }
}

fn assert_balanced(ctx: &CallContext) {
    assert_eq!(ctx.backtrace_depth(), 0);
    assert_eq!(ctx.frame_depth(), 0);
}

#[test]
fn body_value_is_last_expression() {
    let program = Program::new(class(
        "Widget",
        1,
        vec![
            Instr::PutObject(Value::Int(1)),
            Instr::PutObject(Value::string("done")),
        ],
    ));
    let mut ctx = CallContext::default();

    assert_eq!(program.run(&mut ctx), Ok(Value::string("done")));
    assert_balanced(&ctx);
}

#[test]
fn empty_body_is_nil() {
    let program = Program::new(module("Empty", 1, Vec::new()));
    let mut ctx = CallContext::default();

    assert_eq!(program.run(&mut ctx), Ok(Value::Nil));
}

#[test]
fn nested_body_runs_with_new_module_as_self() {
    let inner = class("Inner", 3, vec![Instr::Line(4), Instr::PutSelf]);
    let program = Program::new(module(
        "Outer",
        1,
        vec![Instr::Line(2), Instr::DefineBody(inner)],
    ));
    let mut ctx = CallContext::default();

    let result = program.run(&mut ctx).expect("runs");

    let Value::Module(inner_module) = &result else {
        panic!("expected a module, got {result:?}");
    };
    assert_eq!(inner_module.qualified_name(), "Outer::Inner");
    assert_eq!(inner_module.kind(), ModuleKind::Class);
    assert_eq!(program.interpreter.defined_bodies(), 1);
    assert_balanced(&ctx);
}

#[test]
fn failure_in_nested_body_carries_both_frames() {
    let inner = class(
        "Inner",
        3,
        vec![Instr::Line(6), Instr::Raise("undefined method `frob'".to_owned())],
    );
    let program = Program::new(module(
        "Outer",
        1,
        vec![Instr::Line(2), Instr::DefineBody(inner)],
    ));
    let mut ctx = CallContext::default();

    let err = program.run(&mut ctx).expect_err("inner raised");

    assert_eq!(
        err.kind,
        EvalErrorKind::Raised {
            message: "undefined method `frob'".to_owned()
        }
    );
    assert_eq!(
        err.backtrace.expect("attached").to_string(),
        "app.rb:2:in `Inner'\napp.rb:1:in `Outer'"
    );
    assert_balanced(&ctx);
}

#[test]
fn metaclass_body_reports_singleton_class() {
    let meta = scope(
        ScopeKind::MetaclassBody,
        "Widget",
        2,
        PreparedBody::new(vec![Instr::Line(3), Instr::Raise("nope".to_owned())]),
    );
    let program = Program::new(class("Widget", 1, vec![Instr::Line(2), Instr::DefineBody(meta)]));
    let mut ctx = CallContext::default();

    let err = program.run(&mut ctx).expect_err("raised");

    let bt = err.backtrace.expect("attached");
    let labels: Vec<_> = bt.lines().iter().map(|l| l.label.as_str()).collect();
    assert_eq!(labels, vec!["singleton class", "Widget"]);
}

#[test]
fn rerunning_reopens_the_same_module() {
    let inner = class("Inner", 2, vec![Instr::PutSelf]);
    let program = Program::new(module("Outer", 1, vec![Instr::DefineBody(inner)]));
    let mut ctx = CallContext::default();

    let first = program.run(&mut ctx).expect("first run");
    let second = program.run(&mut ctx).expect("second run");

    assert_eq!(first, second);
    assert_eq!(program.interpreter.defined_bodies(), 1);
}

#[test]
fn explicit_protocol_frames_are_popped_on_failure() {
    let body = scope(
        ScopeKind::ClassBody,
        "Widget",
        1,
        PreparedBody::with_explicit_call_protocol(vec![
            Instr::PushFrame,
            Instr::Raise("boom".to_owned()),
            Instr::PopFrame,
        ]),
    );
    let program = Program::new(body);
    let mut ctx = CallContext::default();

    assert!(program.run(&mut ctx).is_err());
    assert_balanced(&ctx);
}

#[test]
fn explicit_protocol_frame_belongs_to_the_body() {
    let body = scope(
        ScopeKind::ClassBody,
        "Widget",
        1,
        PreparedBody::with_explicit_call_protocol(vec![
            Instr::PushFrame,
            Instr::PutSelf,
            Instr::PopFrame,
        ]),
    );
    let program = Program::new(body);
    let mut ctx = CallContext::default();

    let result = program.run(&mut ctx).expect("runs");

    assert_eq!(result, Value::Module(program.top.implementation_class().clone()));
    assert_balanced(&ctx);
}

/// Source that skips frame validation.
struct Unchecked(Vec<Instr>);

impl InstructionSource for Unchecked {
    fn lower(&self, _scope: &IrScope) -> Result<LoweredBody, LoweringError> {
        Ok(LoweredBody {
            instrs: self.0.clone().into(),
            explicit_call_protocol: true,
        })
    }
}

#[test]
fn stray_pop_frame_is_an_error() {
    let body = Arc::new(IrScope::new(
        ScopeKind::ClassBody,
        "Widget",
        "app.rb",
        1,
        Arc::new(Unchecked(vec![Instr::PopFrame])),
    ));
    let program = Program::new(body);
    let mut ctx = CallContext::default();

    let err = program.run(&mut ctx).expect_err("nothing to pop");

    assert_eq!(err.kind, EvalErrorKind::FrameUnderflow);
    assert_balanced(&ctx);
}

#[test]
fn malformed_nested_body_fails_to_materialize() {
    let broken = scope(
        ScopeKind::ClassBody,
        "Broken",
        2,
        PreparedBody::new(vec![Instr::PushFrame]),
    );
    let program = Program::new(module("Outer", 1, vec![Instr::DefineBody(broken)]));
    let mut ctx = CallContext::default();

    let err = program.run(&mut ctx).expect_err("cannot lower");

    assert!(matches!(err.kind, EvalErrorKind::Materialization { .. }));
    // Attached by the enclosing body.
    assert_eq!(
        err.backtrace.expect("attached").to_string(),
        "app.rb:1:in `Outer'"
    );
    assert_balanced(&ctx);
}

#[test]
fn nesting_deeper_than_the_frame_limit_overflows() {
    let mut innermost = class("Level5", 5, vec![Instr::PutSelf]);
    for depth in (1..5).rev() {
        innermost = module(&format!("Level{depth}"), depth, vec![Instr::DefineBody(innermost)]);
    }
    let program = Program::new(innermost);
    let mut ctx = CallContext::new(RuntimeConfig::default().with_max_depth(3));

    let err = program.run(&mut ctx).expect_err("too deep");

    assert_eq!(err.kind, EvalErrorKind::StackOverflow { depth: 3 });
    assert_eq!(err.backtrace.expect("attached").lines().len(), 3);
    assert_balanced(&ctx);
}

#[test]
fn deep_nesting_without_limit_completes() {
    let mut innermost = class("Leaf", 1, vec![Instr::PutObject(Value::Int(0))]);
    for depth in 0..500 {
        innermost = module(&format!("M{depth}"), 1, vec![Instr::DefineBody(innermost)]);
    }
    let program = Program::new(innermost);
    let mut ctx = CallContext::default();

    assert_eq!(program.run(&mut ctx), Ok(Value::Int(0)));
    assert_eq!(program.interpreter.defined_bodies(), 500);
    assert_balanced(&ctx);
}

#[test]
fn nested_method_scope_is_fatal_and_unwinds() {
    let method = scope(
        ScopeKind::Method,
        "frob",
        2,
        PreparedBody::new(vec![Instr::PutSelf]),
    );
    let program = Program::new(module("Outer", 1, vec![Instr::DefineBody(method)]));
    let mut ctx = CallContext::default();

    let result = catch_unwind(AssertUnwindSafe(|| program.run(&mut ctx)));

    assert!(result.is_err());
    assert_balanced(&ctx);
}

#[test]
fn shared_handle_runs_bodies() {
    let engine = Interpreter::shared();
    let owner = ModuleRef::new("Widget", ModuleKind::Class);
    let body = BodyMethod::new(
        class("Widget", 1, vec![Instr::PutObject(Value::Bool(true))]),
        owner.clone(),
        engine,
    );
    let recv = Value::Module(owner.clone());
    let mut ctx = CallContext::default();

    assert_eq!(
        body.call0(&mut ctx, CallInfo::new(&recv, &owner, "Widget")),
        Ok(Value::Bool(true))
    );
}

#[test]
fn explicit_protocol_frame_is_popped_when_nested_body_panics() {
    let method = scope(
        ScopeKind::Method,
        "frob",
        2,
        PreparedBody::new(vec![Instr::PutSelf]),
    );
    let outer = scope(
        ScopeKind::ModuleBody,
        "Outer",
        1,
        PreparedBody::with_explicit_call_protocol(vec![
            Instr::PushFrame,
            Instr::DefineBody(method),
            Instr::PopFrame,
        ]),
    );
    let program = Program::new(outer);
    let mut ctx = CallContext::default();

    let result = catch_unwind(AssertUnwindSafe(|| program.run(&mut ctx)));

    assert!(result.is_err());
    assert_balanced(&ctx);
}

#[test]
fn dropping_the_program_frees_the_interpreter() {
    let inner = class("Inner", 2, vec![Instr::PutSelf]);
    let program = Program::new(class("Outer", 1, vec![Instr::DefineBody(inner)]));
    let mut ctx = CallContext::default();
    program.run(&mut ctx).expect("runs");
    assert_eq!(program.interpreter.defined_bodies(), 1);

    let interpreter = Arc::downgrade(&program.interpreter);
    drop(program);

    assert!(interpreter.upgrade().is_none(), "interpreter outlived its program");
}

#[test]
fn cached_bodies_rerun_through_detached_engine() {
    let inner = class("Inner", 2, vec![Instr::PutObject(Value::Int(9))]);
    let program = Program::new(module("Outer", 1, vec![Instr::DefineBody(inner)]));
    let mut ctx = CallContext::default();

    assert_eq!(program.run(&mut ctx), Ok(Value::Int(9)));
    assert_eq!(program.run(&mut ctx), Ok(Value::Int(9)));
    assert_eq!(program.interpreter.defined_bodies(), 1);
    assert_balanced(&ctx);
}
