use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_relative_eq;
use kinetic2d::{
    Behavior, BodyComponent, ComponentId, EngineConfig, EngineContext, FixtureComponent,
    FixtureShape, JointComponent, JointSpec, Lifecycle, Map, NodeFactory, NodeId, SafeList,
    Scene, SceneConfig, SceneContext, SceneError, Vec2,
};

fn engine() -> EngineContext {
    EngineContext::new(EngineConfig::default())
}

fn scene(engine: &mut EngineContext) -> Scene {
    let mut scene = Scene::new(SceneConfig::default().with_gravity(Vec2::ZERO));
    scene.initialize(engine).unwrap();
    scene
}

fn square() -> FixtureComponent {
    FixtureComponent::new(FixtureShape::Rectangle {
        width: 2.0,
        height: 2.0,
    })
}

/// Physical node: a dynamic body with a 2x2 fixture.
fn body_node(ctx: &mut SceneContext<'_>, parent: Option<NodeId>, name: &str) -> NodeId {
    let node = ctx.create_node(parent, Some(name));
    ctx.add_component(node, BodyComponent::dynamic());
    ctx.add_component(node, square());
    node
}

#[test]
fn safe_list_walk_skips_removed_and_visits_the_rest_once() {
    let mut list: SafeList<u32> = (0..6).collect();
    let cursor = list.begin();
    let mut visited = Vec::new();

    while let Some(value) = list.advance(cursor) {
        visited.push(value);
        match value {
            // Remove itself and an element further ahead.
            1 => {
                list.remove(&1);
                list.remove(&4);
            }
            // Remove something already visited.
            2 => {
                list.remove(&0);
            }
            3 => list.push(6),
            _ => {}
        }
    }
    list.end(cursor);

    assert_eq!(visited, vec![0, 1, 2, 3, 5, 6]);
    assert_eq!(list.iter().copied().collect::<Vec<_>>(), vec![2, 3, 5, 6]);
    assert_eq!(list.active_cursors(), 0);
}

#[test]
fn nested_walks_keep_independent_cursors() {
    let mut list: SafeList<char> = "abcd".chars().collect();
    let outer = list.begin();
    let mut pairs = Vec::new();

    while let Some(a) = list.advance(outer) {
        let inner = list.begin();
        while let Some(b) = list.advance(inner) {
            if a == 'a' && b == 'c' {
                list.remove(&'b');
            }
            pairs.push((a, b));
        }
        list.end(inner);
    }
    list.end(outer);

    let firsts: Vec<char> = pairs.iter().map(|(a, _)| *a).collect();
    assert!(!firsts.contains(&'b'));
    assert_eq!(pairs.iter().filter(|(a, _)| *a == 'c').count(), 3);
}

#[test]
fn clear_during_a_walk_ends_it() {
    let mut list: SafeList<u32> = (0..4).collect();
    let cursor = list.begin();
    assert_eq!(list.advance(cursor), Some(0));
    list.clear();
    assert_eq!(list.advance(cursor), None);
    list.end(cursor);
}

#[test]
fn second_body_component_is_rejected() {
    let mut engine = engine();
    let mut scene = scene(&mut engine);
    let mut ctx = scene.context(&mut engine);

    let node = ctx.create_node(None, Some("A"));
    let first = ctx.add_component(node, BodyComponent::dynamic());
    let body = ctx.body(node).unwrap();
    let second = ctx.add_component(node, BodyComponent::kinematic());

    assert!(ctx.graph().contains_component(first));
    assert!(!ctx.graph().contains_component(second));
    assert_eq!(ctx.get_components::<BodyComponent>(node), vec![first]);
    assert_eq!(ctx.physics().body_count(), 1);
    assert_eq!(ctx.body(node), Some(body));

    ctx.set_position(node, Vec2::new(64.0, 32.0));
    let sim = ctx.physics().body_position(body).unwrap();
    assert_relative_eq!(sim.x, 1.0, epsilon = 1e-5);
    assert_relative_eq!(sim.y, 0.5, epsilon = 1e-5);
}

#[test]
fn fixture_from_another_body_is_rejected() {
    let mut engine = engine();
    let mut scene = scene(&mut engine);
    let mut ctx = scene.context(&mut engine);

    let a = body_node(&mut ctx, None, "A");
    let b = body_node(&mut ctx, None, "B");
    let fixture_a = ctx.get_component::<FixtureComponent>(a).unwrap();
    let fixture_b = ctx.get_component::<FixtureComponent>(b).unwrap();
    let held = ctx.component::<FixtureComponent>(fixture_a).unwrap().fixture().unwrap();
    let foreign = ctx.component::<FixtureComponent>(fixture_b).unwrap().fixture().unwrap();

    let result = ctx.with_component::<FixtureComponent, _>(fixture_a, |f, ctx| {
        f.set_fixture(ctx, fixture_a, foreign)
    });

    assert_eq!(result, Some(Err(SceneError::FixtureBodyMismatch)));
    let component = ctx.component::<FixtureComponent>(fixture_a).unwrap();
    assert_eq!(component.fixture(), Some(held));
    assert!(ctx.physics().contains_fixture(held));
    assert!(ctx.physics().contains_fixture(foreign));
    assert_eq!(ctx.physics().fixture_owner(foreign), Some(fixture_b));
}

#[test]
fn invalid_shape_keeps_the_current_fixture() {
    let mut engine = engine();
    let mut scene = scene(&mut engine);
    let mut ctx = scene.context(&mut engine);

    let node = body_node(&mut ctx, None, "A");
    let id = ctx.get_component::<FixtureComponent>(node).unwrap();
    let held = ctx.component::<FixtureComponent>(id).unwrap().fixture();

    let zero = FixtureShape::Rectangle {
        width: 0.0,
        height: 1.0,
    };
    let result = ctx.with_component::<FixtureComponent, _>(id, |f, ctx| f.set_shape(ctx, id, zero));

    assert!(matches!(result, Some(Err(SceneError::InvalidShape(_)))));
    let component = ctx.component::<FixtureComponent>(id).unwrap();
    assert_eq!(component.fixture(), held);
    assert_eq!(
        component.shape(),
        &FixtureShape::Rectangle {
            width: 2.0,
            height: 2.0
        }
    );
}

#[test]
fn position_round_trips_through_the_body() {
    let mut engine = engine();
    let mut scene = scene(&mut engine);
    let mut ctx = scene.context(&mut engine);

    let node = ctx.create_node(None, Some("A"));
    ctx.add_component(node, BodyComponent::kinematic());

    let target = Vec2::new(100.5, -37.25);
    ctx.set_position(node, target);
    ctx.set_rotation(node, 0.75);
    let read = ctx.position(node);
    assert_relative_eq!(read.x, target.x, epsilon = 1e-3);
    assert_relative_eq!(read.y, target.y, epsilon = 1e-3);
    assert_relative_eq!(ctx.rotation(node), 0.75, epsilon = 1e-5);
}

#[test]
fn destroying_the_body_keeps_the_last_pose() {
    let mut engine = engine();
    let mut scene = scene(&mut engine);
    let mut ctx = scene.context(&mut engine);

    let node = ctx.create_node(None, Some("A"));
    let body = ctx.add_component(node, BodyComponent::kinematic());
    ctx.set_position(node, Vec2::new(12.0, 24.0));
    ctx.destroy_component(body);

    assert_eq!(ctx.body(node), None);
    assert_eq!(ctx.physics().body_count(), 0);
    let read = ctx.position(node);
    assert_relative_eq!(read.x, 12.0, epsilon = 1e-3);
    assert_relative_eq!(read.y, 24.0, epsilon = 1e-3);
}

#[test]
fn destroying_a_node_leaves_nothing_behind() {
    let mut engine = engine();
    let mut scene = scene(&mut engine);
    let mut ctx = scene.context(&mut engine);

    let parent = body_node(&mut ctx, None, "Parent");
    let child = body_node(&mut ctx, Some(parent), "Child");
    let joint = ctx.add_component(
        child,
        JointComponent::to_parent(JointSpec::Revolute {
            anchor_a: Vec2::ZERO,
            anchor_b: Vec2::ZERO,
        }),
    );
    assert!(ctx.component::<JointComponent>(joint).unwrap().joint().is_some());
    assert_eq!(ctx.physics().body_count(), 2);
    assert_eq!(ctx.physics().fixture_count(), 2);
    assert_eq!(ctx.physics().joint_count(), 1);

    ctx.destroy_node(parent);

    assert!(!ctx.is_live(parent));
    assert!(!ctx.is_live(child));
    assert_eq!(ctx.graph().node_count(), 0);
    assert_eq!(ctx.graph().component_count(), 0);
    assert_eq!(ctx.physics().body_count(), 0);
    assert_eq!(ctx.physics().fixture_count(), 0);
    assert_eq!(ctx.physics().joint_count(), 0);
    assert!(ctx.bodies_at(Vec2::ZERO).is_empty());
}

#[test]
fn square_body_keeps_its_place_without_gravity() {
    let mut engine = engine();
    let mut scene = scene(&mut engine);
    let node = {
        let mut ctx = scene.context(&mut engine);
        let node = ctx.create_node(None, Some("A"));
        ctx.add_component(node, BodyComponent::dynamic());
        ctx.add_component(node, square());
        ctx.set_position(node, Vec2::new(320.0, 240.0));
        node
    };

    scene.update(&mut engine).unwrap();

    let ctx = scene.context(&mut engine);
    let body = ctx.body(node).unwrap();
    assert!(ctx.physics().mass(body).unwrap() > 0.0);
    let position = ctx.position(node);
    assert_relative_eq!(position.x, 320.0, epsilon = 1e-3);
    assert_relative_eq!(position.y, 240.0, epsilon = 1e-3);
    assert_eq!(ctx.body_at(Vec2::new(320.0, 240.0)), ctx.get_component::<BodyComponent>(node));
}

#[test]
fn fixture_without_body_destroys_itself() {
    let mut engine = engine();
    let mut scene = scene(&mut engine);
    let mut ctx = scene.context(&mut engine);

    let node = ctx.create_node(None, Some("A"));
    let fixture = ctx.add_component(node, square());

    assert!(!ctx.graph().contains_component(fixture));
    assert!(ctx.get_components::<FixtureComponent>(node).is_empty());
    assert_eq!(ctx.physics().fixture_count(), 0);
}

#[test]
fn joint_needs_a_parent_body() {
    let mut engine = engine();
    let mut scene = scene(&mut engine);
    let mut ctx = scene.context(&mut engine);

    let orphan = body_node(&mut ctx, None, "Orphan");
    let joint = ctx.add_component(
        orphan,
        JointComponent::to_parent(JointSpec::Revolute {
            anchor_a: Vec2::ZERO,
            anchor_b: Vec2::ZERO,
        }),
    );
    assert!(!ctx.graph().contains_component(joint));

    let parent = ctx.create_node(None, Some("Parent"));
    ctx.add_component(parent, BodyComponent::fixed());
    let child = body_node(&mut ctx, Some(parent), "Child");
    let manual = ctx.add_component(child, JointComponent::new());
    let result = ctx.with_component::<JointComponent, _>(manual, |j, ctx| {
        j.connect(
            ctx,
            manual,
            JointSpec::Revolute {
                anchor_a: Vec2::ZERO,
                anchor_b: Vec2::ZERO,
            },
        )
    });
    assert_eq!(result, Some(Err(SceneError::MissingFixture)));
    assert_eq!(ctx.physics().joint_count(), 0);
}

#[test]
fn components_cannot_change_owner() {
    let mut engine = engine();
    let mut scene = scene(&mut engine);
    let mut ctx = scene.context(&mut engine);

    let a = ctx.create_node(None, Some("A"));
    let b = ctx.create_node(None, Some("B"));
    let body = ctx.add_component(a, BodyComponent::kinematic());

    assert!(ctx.reparent_component(body, a).is_ok());
    assert_eq!(
        ctx.reparent_component(body, b),
        Err(SceneError::ComponentOwnerFixed)
    );
    assert_eq!(ctx.owner(body), Some(a));
}

type UpdateLog = Rc<RefCell<Vec<String>>>;

struct Recorder {
    name: String,
    log: UpdateLog,
    destroy: Option<NodeId>,
}

impl Behavior for Recorder {
    fn on_update(&mut self, ctx: &mut SceneContext<'_>, _me: ComponentId, _dt: f32) {
        self.log.borrow_mut().push(self.name.clone());
        if let Some(victim) = self.destroy.take() {
            ctx.destroy_node(victim);
        }
    }
}

#[test]
fn sibling_destroyed_mid_update_is_skipped() {
    let mut engine = engine();
    let mut scene = scene(&mut engine);
    let log = UpdateLog::default();
    {
        let mut ctx = scene.context(&mut engine);
        let nodes: Vec<NodeId> = ["A", "B", "C", "D"]
            .iter()
            .map(|name| ctx.create_node(None, Some(*name)))
            .collect();
        for (i, &node) in nodes.iter().enumerate() {
            let name = ctx.name(node).unwrap().to_string();
            ctx.add_component(
                node,
                Recorder {
                    name,
                    log: Rc::clone(&log),
                    destroy: (i == 0).then_some(nodes[2]),
                },
            );
        }
    }

    scene.update(&mut engine).unwrap();
    assert_eq!(*log.borrow(), vec!["A", "B", "D"]);

    log.borrow_mut().clear();
    scene.update(&mut engine).unwrap();
    assert_eq!(*log.borrow(), vec!["A", "B", "D"]);
}

#[test]
fn created_node_is_registered_then_initialized() {
    let mut engine = engine();
    let mut scene = scene(&mut engine);
    let mut ctx = scene.context(&mut engine);

    let parent = ctx.create_node(None, Some("Parent"));
    let child = ctx.create_node(Some(parent), Some("Child"));

    assert_eq!(ctx.children(parent), vec![child]);
    assert_eq!(ctx.parent(child), Some(parent));
    assert_eq!(
        ctx.graph().node(child).map(|n| n.lifecycle()),
        Some(Lifecycle::Initialized)
    );
    assert_eq!(ctx.graph().root_nodes(), vec![parent]);
}

#[test]
fn destroying_twice_leaves_the_sibling_alone() {
    let mut engine = engine();
    let mut scene = scene(&mut engine);
    let mut ctx = scene.context(&mut engine);

    let sibling = body_node(&mut ctx, None, "Sibling");
    let victim = body_node(&mut ctx, None, "Victim");
    let body = ctx.get_component::<BodyComponent>(victim).unwrap();
    assert_eq!(ctx.physics().body_count(), 2);

    ctx.destroy_component(body);
    ctx.destroy_component(body);
    assert_eq!(ctx.physics().body_count(), 1);

    ctx.destroy_node(victim);
    ctx.destroy_node(victim);

    assert_eq!(ctx.graph().node_count(), 1);
    assert_eq!(ctx.graph().component_count(), 2);
    assert_eq!(ctx.physics().body_count(), 1);
    assert_eq!(ctx.physics().fixture_count(), 1);
    assert!(ctx.body(sibling).is_some());
    assert!(ctx.is_live(sibling));
}

/// Logs `u:<name>` on update and `d:<name>` on destroy, marking a destroy
/// that runs after its node already left the graph.
struct Lifeline {
    name: &'static str,
    log: UpdateLog,
    destroy_owner: bool,
}

impl Lifeline {
    fn new(name: &'static str, log: &UpdateLog) -> Self {
        Self {
            name,
            log: Rc::clone(log),
            destroy_owner: false,
        }
    }
}

impl Behavior for Lifeline {
    fn on_update(&mut self, ctx: &mut SceneContext<'_>, me: ComponentId, _dt: f32) {
        self.log.borrow_mut().push(format!("u:{}", self.name));
        if self.destroy_owner {
            if let Some(node) = ctx.owner(me) {
                ctx.destroy_node(node);
            }
        }
    }

    fn on_destroy(&mut self, ctx: &mut SceneContext<'_>, me: ComponentId) {
        let attached = ctx.owner(me).and_then(|n| ctx.name(n)).is_some();
        let entry = if attached {
            format!("d:{}", self.name)
        } else {
            format!("d:{}(detached)", self.name)
        };
        self.log.borrow_mut().push(entry);
    }
}

#[test]
fn component_destroying_its_own_node_mid_update() {
    let mut engine = engine();
    let mut scene = scene(&mut engine);
    let log = UpdateLog::default();
    {
        let mut ctx = scene.context(&mut engine);
        let doomed = body_node(&mut ctx, None, "Doomed");
        ctx.add_component(
            doomed,
            Lifeline {
                destroy_owner: true,
                ..Lifeline::new("a1", &log)
            },
        );
        ctx.add_component(doomed, Lifeline::new("a2", &log));
        let child = ctx.create_node(Some(doomed), Some("Child"));
        ctx.add_component(child, Lifeline::new("c", &log));
        let survivor = ctx.create_node(None, Some("Survivor"));
        ctx.add_component(survivor, Lifeline::new("z", &log));
        assert_eq!(ctx.physics().body_count(), 1);
    }

    scene.update(&mut engine).unwrap();
    assert_eq!(*log.borrow(), vec!["u:a1", "d:c", "d:a2", "d:a1", "u:z"]);
    {
        let ctx = scene.context(&mut engine);
        assert_eq!(ctx.graph().node_count(), 1);
        assert_eq!(ctx.graph().component_count(), 1);
        assert_eq!(ctx.physics().body_count(), 0);
        assert_eq!(ctx.physics().fixture_count(), 0);
    }

    log.borrow_mut().clear();
    scene.update(&mut engine).unwrap();
    assert_eq!(*log.borrow(), vec!["u:z"]);
}

#[test]
fn map_ellipse_becomes_an_ellipse_fixture() {
    let map = Map::from_json(
        r#"{ "layers": [ { "type": "objectgroup", "name": "Objects", "objects": [
            { "id": 1, "name": "Egg", "type": "ellipse", "x": 10, "y": 20, "width": 2, "height": 4, "rotation": 0 },
            { "id": 2, "name": "Ball", "type": "ellipse", "x": 0, "y": 0, "width": 64, "height": 64 }
        ] } ] }"#,
    )
    .unwrap();
    let objects: Vec<_> = map.objects().collect();

    let mut engine = engine();
    let mut scene = scene(&mut engine);
    let mut ctx = scene.context(&mut engine);

    let egg = NodeFactory::create(&mut ctx, objects[0]).unwrap();
    let fixture = ctx.get_component::<FixtureComponent>(egg).unwrap();
    match ctx.component::<FixtureComponent>(fixture).unwrap().shape() {
        FixtureShape::Ellipse {
            x_radius, y_radius, ..
        } => {
            assert_relative_eq!(*x_radius, 1.0 / 64.0);
            assert_relative_eq!(*y_radius, 2.0 / 64.0);
        }
        other => panic!("expected an ellipse, got {other:?}"),
    }
    let centre = ctx.position(egg);
    assert_relative_eq!(centre.x, 11.0, epsilon = 1e-3);
    assert_relative_eq!(centre.y, 22.0, epsilon = 1e-3);

    let ball = NodeFactory::create(&mut ctx, objects[1]).unwrap();
    let fixture = ctx.get_component::<FixtureComponent>(ball).unwrap();
    assert!(matches!(
        ctx.component::<FixtureComponent>(fixture).unwrap().shape(),
        FixtureShape::Circle { .. }
    ));
}

#[test]
fn malformed_polygon_object_creates_no_node() {
    let map = Map::from_json(
        r#"{ "layers": [ { "type": "objectgroup", "name": "Objects", "objects": [
            { "id": 1, "name": "Broken", "shape": "polygon", "x": 0, "y": 0, "points": "0,0 10,x 5,5" }
        ] } ] }"#,
    )
    .unwrap();
    let object = map.objects().next().unwrap();

    let mut engine = engine();
    let mut scene = scene(&mut engine);
    let mut ctx = scene.context(&mut engine);
    assert_eq!(NodeFactory::create(&mut ctx, object), None);
    assert_eq!(ctx.graph().node_count(), 0);
}
