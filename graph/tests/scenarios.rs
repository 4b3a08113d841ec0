//! End-to-end scenarios: schemas declared with forward references, then
//! objects linked through the typed and dynamic accessors.

use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;
use tether_core::{refs, ObjectId, Value};
use tether_forward::{Arg, Slot};
use tether_graph::{AssocError, GraphConfig, ObjectGraph};
use tether_registry::{EndpointDecl, RegistryBuilder, SchemaValue};

fn checked(builder: RegistryBuilder) -> ObjectGraph {
    ObjectGraph::with_config(
        builder.build().unwrap(),
        GraphConfig::new().with_verify_symmetry(true),
    )
}

// ========== TEST: singleton_replace ==========
#[test]
fn test_singleton_replace_moves_back_link() {
    // GIVEN a.partner = b through a ONE-ONE pair
    let mut builder = RegistryBuilder::new();
    builder
        .add_class("A")
        .endpoint(EndpointDecl::one("partner").target("B"))
        .done()
        .unwrap();
    let partner = builder.endpoint_of("A", "partner").unwrap();
    builder
        .add_class("B")
        .endpoint(EndpointDecl::one("back").peer(partner))
        .done()
        .unwrap();
    let back = builder.endpoint_of("B", "back").unwrap();
    let mut graph = checked(builder);
    let a = graph.create_named("A").unwrap();
    let b = graph.create_named("B").unwrap();
    let c = graph.create_named("B").unwrap();
    graph.one(a, partner).unwrap().set(Some(b)).unwrap();

    // WHEN a.partner = c
    graph.one(a, partner).unwrap().set(Some(c)).unwrap();

    // THEN b is unlinked and c points back at a
    assert_eq!(graph.one(b, back).unwrap().get(), None);
    assert_eq!(graph.one(c, back).unwrap().get(), Some(a));
    assert_eq!(graph.one(a, partner).unwrap().get(), Some(c));
}

// ========== TEST: self_loop ==========
#[test]
fn test_symmetric_many_self_loop() {
    // GIVEN Node.neighbors as its own peer
    let mut builder = RegistryBuilder::new();
    builder
        .add_class("Node")
        .endpoint(EndpointDecl::many("neighbors").symmetric())
        .done()
        .unwrap();
    let neighbors = builder.endpoint_of("Node", "neighbors").unwrap();
    let mut graph = checked(builder);
    let n = graph.create_named("Node").unwrap();

    // WHEN n is added to its own neighbors
    graph.many(n, neighbors).unwrap().add(n).unwrap();

    // THEN it is a member once, and removal undoes it
    assert!(graph.many(n, neighbors).unwrap().contains(n));
    assert_eq!(graph.many(n, neighbors).unwrap().len(), 1);
    graph.many(n, neighbors).unwrap().remove(n).unwrap();
    assert!(!graph.many(n, neighbors).unwrap().contains(n));
}

// ========== TEST: slice_atomicity ==========
#[test]
fn test_ordered_splice_is_atomic() {
    // GIVEN queue = [j0, j1, j2]
    let mut builder = RegistryBuilder::new();
    builder.add_class("Job").done().unwrap();
    builder
        .add_class("Queue")
        .endpoint(EndpointDecl::ordered("jobs").target("Job"))
        .done()
        .unwrap();
    let jobs = builder.endpoint_of("Queue", "jobs").unwrap();
    let mut graph = checked(builder);
    let q = graph.create_named("Queue").unwrap();
    let j: Vec<ObjectId> = (0..4).map(|_| graph.create_named("Job").unwrap()).collect();
    graph.ordered(q, jobs).unwrap().assign(j[..3].to_vec()).unwrap();
    let before = graph.ordered(q, jobs).unwrap().ids();

    // WHEN a slice gets an internal duplicate, or a member kept elsewhere
    let internal = graph
        .ordered(q, jobs)
        .unwrap()
        .splice(0..1, vec![j[3], j[3]]);
    let kept_elsewhere = graph.ordered(q, jobs).unwrap().splice(0..1, vec![j[2]]);
    let extend = graph.ordered(q, jobs).unwrap().extend([j[3], j[0]]);

    // THEN each is a Duplicate and the container did not move
    for result in [internal.map(drop), kept_elsewhere.map(drop), extend] {
        assert!(matches!(result, Err(AssocError::Duplicate { .. })));
    }
    assert_eq!(graph.ordered(q, jobs).unwrap().ids(), before);
    assert!(graph.verify().is_empty());

    // AND displacing a member within the slice is allowed
    graph
        .ordered(q, jobs)
        .unwrap()
        .splice(0..2, vec![j[1], j[0]])
        .unwrap();
    assert_eq!(
        graph.ordered(q, jobs).unwrap().ids(),
        vec![j[1], j[0], j[2]]
    );
}

// ========== TEST: forward_declared_schema ==========
#[test]
fn test_forward_declared_peer_links_objects() {
    // GIVEN Employee names Company.staff before Company exists
    let mut builder = RegistryBuilder::new();
    let staff_ref = builder.forward_path("Company.staff").unwrap();
    let company_ref = builder.forward("Company").unwrap();
    builder
        .add_class("Employee")
        .endpoint(
            EndpointDecl::one("employer")
                .target(company_ref)
                .peer(staff_ref),
        )
        .done()
        .unwrap();
    builder
        .add_class("Company")
        .endpoint(EndpointDecl::many("staff").target("Employee"))
        .done()
        .unwrap();
    let mut graph = checked(builder);
    let acme = graph.create_named("Company").unwrap();
    let globex = graph.create_named("Company").unwrap();
    let e = graph.create_named("Employee").unwrap();

    // WHEN the employee is hired by acme, then moves to globex by name
    graph.set(e, "employer", Value::Ref(acme)).unwrap();
    assert_eq!(graph.get(acme, "staff").unwrap(), refs![e]);
    graph.set(globex, "staff", refs![e]).unwrap();

    // THEN acme lost the employee
    assert_eq!(graph.get(acme, "staff").unwrap(), refs![]);
    assert_eq!(graph.get(e, "employer").unwrap(), Value::Ref(globex));
}

// ========== TEST: forward_call_composition ==========
#[test]
fn test_forward_call_over_schema_references() {
    // GIVEN a call combining Team.lead and Team before Team exists
    let mut builder = RegistryBuilder::new();
    let lead_ref = builder.forward_path("Team.lead").unwrap();
    let team_ref = builder.forward("Team").unwrap();
    let fired = Rc::new(RefCell::new(Vec::new()));

    let ctx = builder.forward_context_mut();
    let call = ctx
        .forward_call(|_, args| {
            let team = args.arg(1).and_then(SchemaValue::as_class).cloned();
            let lead = args.arg(0).and_then(SchemaValue::as_endpoint);
            match (team, lead) {
                (Some(team), Some(lead)) if team.endpoint("lead") == Some(lead) => {
                    Ok(SchemaValue::Endpoint(lead))
                }
                _ => Err(tether_forward::ForwardError::callback("lead is not on Team")),
            }
        })
        .arg(lead_ref)
        .arg(Arg::from(team_ref))
        .done()
        .unwrap();
    let sink = Rc::clone(&fired);
    ctx.attach_call(call, Slot::Unit, move |_, value, _| {
        sink.borrow_mut().push(value);
        Ok(())
    })
    .unwrap();
    assert!(ctx.barrier(call).unwrap() > 0);
    assert!(ctx.call_result(call).is_none());

    // WHEN Team is done
    builder.add_class("Person").done().unwrap();
    builder
        .add_class("Team")
        .endpoint(EndpointDecl::one("lead").target("Person"))
        .done()
        .unwrap();

    // THEN the call ran once with the resolved endpoint
    let lead = builder.endpoint_of("Team", "lead").unwrap();
    let ctx = builder.forward_context();
    assert_eq!(ctx.call_result(call), Some(&SchemaValue::Endpoint(lead)));
    assert_eq!(*fired.borrow(), vec![SchemaValue::Endpoint(lead)]);
    assert!(!ctx.has_pending());
    assert!(builder.build().is_ok());
}

// ========== TEST: remove_object ==========
#[test]
fn test_removed_object_leaves_no_links() {
    // GIVEN a tree of folders with ordered children
    let mut builder = RegistryBuilder::new();
    builder
        .add_class("Folder")
        .endpoint(EndpointDecl::one("parent").target("Folder"))
        .done()
        .unwrap();
    let parent = builder.endpoint_of("Folder", "parent").unwrap();
    builder
        .add_class("Root")
        .extends("Folder")
        .endpoint(EndpointDecl::ordered("children").target("Folder"))
        .done()
        .unwrap();
    // Root.children is one-way here; Folder.parent pairs with nothing.
    let children = builder.endpoint_of("Root", "children").unwrap();
    let mut graph = checked(builder);
    let root = graph.create_named("Root").unwrap();
    let a = graph.create_named("Folder").unwrap();
    let b = graph.create_named("Folder").unwrap();
    graph.ordered(root, children).unwrap().extend([a, b]).unwrap();
    graph.one(a, parent).unwrap().set(Some(root)).unwrap();
    graph.one(b, parent).unwrap().set(Some(a)).unwrap();

    // WHEN a is removed
    graph.remove_object(a).unwrap();

    // THEN root and b no longer refer to it
    assert_eq!(graph.ordered(root, children).unwrap().ids(), vec![b]);
    assert_eq!(graph.one(b, parent).unwrap().get(), None);
    assert_eq!(graph.objects(), vec![root, b]);
}

// ========== TEST: insert_at ==========
#[test]
fn test_peer_side_links_use_insert_at() {
    let mut builder = RegistryBuilder::new();
    builder
        .add_class("Post")
        .endpoint(EndpointDecl::one("feed").target("Feed"))
        .done()
        .unwrap();
    let feed = builder.endpoint_of("Post", "feed").unwrap();
    builder
        .add_class("Feed")
        .endpoint(EndpointDecl::ordered("posts").peer(feed).insert_at(0))
        .done()
        .unwrap();
    let posts = builder.endpoint_of("Feed", "posts").unwrap();
    let mut graph = checked(builder);
    let f = graph.create_named("Feed").unwrap();
    let p: Vec<ObjectId> = (0..3).map(|_| graph.create_named("Post").unwrap()).collect();

    for &post in &p {
        graph.one(post, feed).unwrap().set(Some(f)).unwrap();
    }

    // Newest first, since each link from the post side lands at index 0.
    assert_eq!(
        graph.ordered(f, posts).unwrap().ids(),
        vec![p[2], p[1], p[0]]
    );
}

// ========== TEST: required_one ==========
#[test]
fn test_required_one_cannot_be_cleared() {
    let mut builder = RegistryBuilder::new();
    builder.add_class("Owner").done().unwrap();
    builder
        .add_class("Pet")
        .endpoint(EndpointDecl::one("owner").target("Owner").required())
        .done()
        .unwrap();
    let owner = builder.endpoint_of("Pet", "owner").unwrap();
    let mut graph = checked(builder);
    let o = graph.create_named("Owner").unwrap();
    let pet = graph.create_named("Pet").unwrap();
    graph.one(pet, owner).unwrap().set(Some(o)).unwrap();

    let result = graph.one(pet, owner).unwrap().clear();

    assert!(matches!(result, Err(AssocError::NullViolation { .. })));
    assert_eq!(graph.one(pet, owner).unwrap().get(), Some(o));
}

// ========== TEST: subclass_targets ==========
#[test]
fn test_subclass_instances_are_admitted() {
    let mut builder = RegistryBuilder::new();
    builder.add_class("Animal").done().unwrap();
    builder.add_class("Dog").extends("Animal").done().unwrap();
    builder.add_class("Rock").done().unwrap();
    builder
        .add_class("Zoo")
        .endpoint(EndpointDecl::many("animals").target("Animal"))
        .done()
        .unwrap();
    let animals = builder.endpoint_of("Zoo", "animals").unwrap();
    let mut graph = checked(builder);
    let zoo = graph.create_named("Zoo").unwrap();
    let dog = graph.create_named("Dog").unwrap();
    let rock = graph.create_named("Rock").unwrap();

    let mut many = graph.many(zoo, animals).unwrap();
    assert!(many.add(dog).unwrap());
    assert!(matches!(
        many.add(rock),
        Err(AssocError::TypeViolation { .. })
    ));
    assert_eq!(many.ids(), vec![dog]);
}
