//! Program traversal, simplification and choice hierarchy integration tests

use tpn_plan::tpn_support::{ChoiceKind, Conjunction, Support};
use tpn_plan::{
    group_by_support, ChoiceSpec, CompositionOptions, ConstraintRef, DurationSpec, EpisodeSpec,
    PlanError, PlanTraverser, Program, Relation, StateDomain, StateValue,
};

fn survey_program() -> Program {
    let mut program = Program::new();
    program.set_name("survey()");

    let drive = program.add_episode(EpisodeSpec::action("drive").with_id("drive")).unwrap();
    let scan = program
        .add_episode(
            EpisodeSpec::action("scan")
                .with_id("scan")
                .with_duration(DurationSpec::controllable(2.0, 4.0)),
        )
        .unwrap();
    let photo = program.add_episode(EpisodeSpec::action("photo").with_id("photo")).unwrap();
    let sense = program
        .decide(
            ChoiceSpec::new(["SCAN", "PHOTO"])
                .with_id("sensor")
                .with_utility(vec![3.0, 1.0]),
            [scan, photo],
            CompositionOptions::new().with_id("sense"),
        )
        .unwrap();
    let plan = program
        .sequence([drive, sense], CompositionOptions::new().with_id("mission"))
        .unwrap();
    program.set_plan(plan).unwrap();
    program
}

#[test]
fn test_traversal_is_idempotent() {
    let mut program = survey_program();

    let primitives = program.primitive_episodes().unwrap().clone();
    let events = program.events().unwrap().clone();
    let constraints = program.temporal_constraints().unwrap();
    let fingerprint = program.fingerprint().unwrap();

    assert_eq!(program.primitive_episodes().unwrap(), &primitives);
    assert_eq!(program.events().unwrap(), &events);
    assert_eq!(program.temporal_constraints().unwrap(), constraints);
    assert_eq!(program.fingerprint().unwrap(), fingerprint);

    // A no-op mutation forces a rebuild with the same result.
    program.graph_mut();
    assert_eq!(program.primitive_episodes().unwrap(), &primitives);
    assert_eq!(program.events().unwrap(), &events);
    assert_eq!(program.fingerprint().unwrap(), fingerprint);
}

#[test]
fn test_episode_lookup_and_accessors() {
    let mut program = survey_program();
    let sense = program.episode_by_id("sense").unwrap();
    let mission = program.episode_by_id("mission").unwrap();
    assert_eq!(program.plan(), Some(mission));

    let drive = program.episode_by_id("drive").unwrap();
    assert_eq!(
        program.first_event().unwrap(),
        program.graph().episode(drive).unwrap().start()
    );
    assert_eq!(
        program.last_event().unwrap(),
        program.graph().episode(sense).unwrap().end()
    );

    let decisions = program.decisions().unwrap();
    assert_eq!(decisions.len(), 1);
    let sensor = *decisions.iter().next().unwrap();
    let choice = program.graph().choice(sensor).unwrap();
    assert_eq!(choice.kind(), ChoiceKind::Controllable);
    assert_eq!(choice.utility_of(&"SCAN".into()), Some(3.0));
    assert!(program.observations().unwrap().is_empty());
}

#[test]
fn test_simplify_intersects_bounds() {
    let mut program = Program::new();
    let (x, y) = (program.add_event(), program.add_event());
    let wide = program
        .add_temporal_constraint(x, y, &DurationSpec::controllable(1.0, 10.0))
        .unwrap();
    let narrow = program
        .add_temporal_constraint(x, y, &DurationSpec::controllable(2.0, 8.0))
        .unwrap();

    program.simplify_temporal_constraints().unwrap();

    let remaining = program.user_defined_temporal_constraints().clone();
    assert_eq!(remaining.len(), 1);
    assert!(remaining.contains(&wide));
    assert!(!remaining.contains(&narrow));
    let tc = program.graph().temporal_constraint(wide).unwrap();
    assert_eq!((tc.lb(), tc.ub()), (2.0, 8.0));
}

#[test]
fn test_simplify_rejects_disjoint_bounds() {
    let mut program = Program::new();
    let (x, y) = (program.add_event(), program.add_event());
    let first = program
        .add_temporal_constraint(x, y, &DurationSpec::controllable(1.0, 2.0))
        .unwrap();
    program
        .add_temporal_constraint(x, y, &DurationSpec::controllable(5.0, 6.0))
        .unwrap();

    assert!(matches!(
        program.simplify_temporal_constraints(),
        Err(PlanError::InvalidType(_))
    ));
    assert_eq!(program.user_defined_temporal_constraints().len(), 2);
    let tc = program.graph().temporal_constraint(first).unwrap();
    assert_eq!((tc.lb(), tc.ub()), (1.0, 2.0));
}

#[test]
fn test_choice_clusters_and_activation() {
    let mut program = Program::new();
    let a = program.add_episode(EpisodeSpec::action("a")).unwrap();
    let b = program.add_episode(EpisodeSpec::action("b")).unwrap();
    let c = program.add_episode(EpisodeSpec::action("c")).unwrap();
    let d = program.add_episode(EpisodeSpec::action("d")).unwrap();

    let left = program
        .decide(ChoiceSpec::new(["P", "Q"]).with_id("left"), [a, b], CompositionOptions::new())
        .unwrap();
    let right = program
        .observe(
            ChoiceSpec::new(["P", "Q"])
                .with_id("right")
                .with_kind(ChoiceKind::Uncontrollable),
            [c, d],
            CompositionOptions::new(),
        )
        .unwrap();
    let plan = program
        .decide(ChoiceSpec::new(["L", "R"]).with_id("root"), [left, right], CompositionOptions::new())
        .unwrap();
    program.set_plan(plan).unwrap();

    let root = program.graph().episode(plan).unwrap().start();
    let left_choice = program.graph().episode(left).unwrap().start();
    let right_choice = program.graph().episode(right).unwrap().start();

    let traverser = PlanTraverser::new(&mut program).unwrap();
    assert_eq!(traverser.clusters().len(), 3);
    assert_eq!(traverser.initially_active_choices(), &[root]);

    let root_var = program.graph().choice(root).unwrap().var().clone();
    assert_eq!(traverser.activated_choices(root, &root_var.is("L")), &[left_choice]);
    assert_eq!(traverser.activated_choices(root, &root_var.is("R")), &[right_choice]);
    assert_eq!(traverser.choice_activation().len(), 1);

    let under_l: Conjunction = [root_var.is("L")].into_iter().collect();
    let active = traverser.active_temporal_constraints(&under_l);
    assert!(active.iter().all(|tc| {
        let support = program.graph().support(*tc).unwrap();
        support.is_active(&under_l)
    }));
    assert!(!active.is_empty());
}

#[test]
fn test_group_by_support_puts_unconditioned_first() {
    let mut program = Program::new();
    let x = program
        .add_choice(ChoiceSpec::new(["A", "B"]).with_kind(ChoiceKind::Controllable))
        .unwrap();
    let x_a = program.graph().choice(x).unwrap().var().is("A");
    let x_b = program.graph().choice(x).unwrap().var().is("B");

    let clusters = group_by_support(vec![
        (1, Support::from_assignment(x_a.clone())),
        (2, Support::always_true()),
        (3, Support::from_assignment(x_b)),
        (4, Support::from_assignment(x_a)),
    ]);
    assert_eq!(clusters.len(), 3);
    assert_eq!(clusters[0].members, vec![2]);
    assert_eq!(clusters[1].members, vec![1, 4]);
    assert_eq!(clusters[2].members, vec![3]);
}

#[test]
fn test_state_constraints_and_chance_constraints() {
    let mut program = survey_program();
    let battery = program
        .add_state_variable("battery", StateDomain::Continuous([0.0, 100.0]))
        .unwrap();
    let mode = program
        .add_state_variable(
            "mode",
            StateDomain::FiniteDiscrete(vec![StateValue::from("idle"), StateValue::from("busy")]),
        )
        .unwrap();

    let floor = program
        .graph_mut()
        .add_linear_constraint(vec![battery], vec![1.0], Relation::Ge, 20.0)
        .unwrap();
    program.add_overall_state_constraint(floor).unwrap();
    assert!(program.state_constraints().unwrap().contains(&floor));
    assert_eq!(
        program.graph().state_constraint_formula(floor).unwrap(),
        "+1*battery >= 20"
    );

    let deadline = program
        .add_overall_temporal_constraint(&DurationSpec::controllable(0.0, 60.0))
        .unwrap();
    let cc = program
        .add_chance_constraint(
            vec![ConstraintRef::Temporal(deadline), ConstraintRef::State(floor)],
            0.05,
        )
        .unwrap();
    assert!(matches!(
        program.register_chance_constraint(cc),
        Err(PlanError::DuplicateElement(_))
    ));
    assert!(matches!(
        program.add_chance_constraint(vec![ConstraintRef::Temporal(deadline)], 1.5),
        Err(PlanError::InvalidValue(_))
    ));

    program
        .set_initial_state([(mode, StateValue::from("idle"))].into_iter().collect())
        .unwrap();
    assert!(program
        .set_initial_state([(mode, StateValue::from("asleep"))].into_iter().collect())
        .is_err());

    let summary = program.summary().unwrap();
    assert_eq!(summary.name, "survey()");
    assert_eq!(summary.primitive_episodes, 3);
    assert_eq!(summary.decisions, 1);
    assert_eq!(summary.state_variables, 2);
    assert_eq!(summary.user_temporal_constraints, 1);
    assert_eq!(summary.chance_constraints, 1);

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["state_constraints"], 1);
    assert_eq!(json["name"], "survey()");
}
