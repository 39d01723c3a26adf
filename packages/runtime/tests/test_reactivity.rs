use ant_dom::{HostDocument, NodeId};
use ant_runtime::{App, Component, ComponentDef, Headless, RenderError, RuntimeConfig, RuntimeError};
use ant_vdom::{Event, EventHandler, VNode, Value};
use std::cell::RefCell;
use std::rc::Rc;

fn number(value: Option<&Value>) -> f64 {
    value.and_then(Value::as_number).unwrap_or(0.0)
}

fn counter(app: &App) -> Component {
    app.create_component(
        ComponentDef::new("Counter", |scope| {
            let count = number(scope.state("count"));
            let handle = scope.handle();
            Ok(VNode::element("button")
                .on(
                    "click",
                    EventHandler::new(move |_| {
                        handle.update_state("count", |v| Value::from(number(v) + 1.0));
                    }),
                )
                .with_child(VNode::text(format!("{}", count))))
        })
        .with_state("count", 0),
    )
}

fn setup() -> (Headless, NodeId) {
    Headless::with_mount_point(RuntimeConfig::default()).unwrap()
}

#[test]
fn test_mount_renders_synchronously() {
    let (headless, mount) = setup();
    let component = counter(&headless.app);
    headless.app.mount(&component, "#app").unwrap();

    assert!(component.is_mounted());
    assert_eq!(component.root(), Some(mount));
    assert_eq!(headless.html(mount), "<button>0</button>");
}

#[test]
fn test_mount_fails_for_unknown_selector() {
    let (headless, _) = setup();
    let component = counter(&headless.app);
    let result = headless.app.mount(&component, "#missing");

    assert!(matches!(result, Err(RuntimeError::MountTargetNotFound(s)) if s == "#missing"));
    assert!(!component.is_mounted());
}

#[test]
fn test_writes_before_mount_schedule_nothing() {
    let (headless, _) = setup();
    let component = counter(&headless.app);

    assert!(component.set_state("count", 5));
    assert_eq!(headless.app.scheduler().stats().scheduled, 0);
    assert_eq!(headless.idle.pending(), 0);
}

#[test]
fn test_only_real_changes_schedule_rerender() {
    let (headless, mount) = setup();
    let component = counter(&headless.app);
    headless.app.mount(&component, "#app").unwrap();

    assert!(!component.set_state("count", 0));
    assert_eq!(headless.app.scheduler().stats().scheduled, 0);

    assert!(component.set_state("count", 3));
    assert_eq!(headless.app.scheduler().stats().scheduled, 1);
    // nothing runs synchronously
    assert_eq!(headless.html(mount), "<button>0</button>");

    headless.run_until_settled();
    assert_eq!(headless.html(mount), "<button>3</button>");
}

#[test]
fn test_patches_wait_for_frame() {
    let (headless, mount) = setup();
    let component = counter(&headless.app);
    headless.app.mount(&component, "#app").unwrap();

    component.set_state("count", 1);
    headless.idle.run_until_idle(usize::MAX);
    assert_eq!(headless.app.patcher().pending_jobs(), 1);
    assert_eq!(headless.html(mount), "<button>0</button>");
    assert_eq!(headless.frames.pending(), 1);

    headless.frames.tick();
    assert_eq!(headless.html(mount), "<button>1</button>");
}

#[test]
fn test_click_handler_updates_state_and_keeps_node() {
    let (headless, mount) = setup();
    let component = counter(&headless.app);
    headless.app.mount(&component, "#app").unwrap();
    let button = headless.document.children(mount).unwrap()[0];

    for _ in 0..3 {
        headless.document.dispatch(button, &Event::new("click"));
        headless.run_until_settled();
    }

    assert_eq!(headless.html(mount), "<button>3</button>");
    assert_eq!(headless.document.children(mount).unwrap(), vec![button]);
    // each render hands a new closure; the old listener is replaced, not stacked
    assert_eq!(headless.document.listener_count(button, "click"), 1);
}

#[test]
fn test_batch_defers_every_update() {
    let (headless, mount) = setup();
    let component = counter(&headless.app);
    headless.app.mount(&component, "#app").unwrap();

    headless.app.batch(|| {
        component.set_state("count", 1);
        component.set_state("count", 2);
        assert!(headless.app.scheduler().is_batching());
        assert_eq!(headless.idle.pending(), 0);
    });

    assert_eq!(headless.idle.pending(), 1);
    headless.run_until_settled();
    assert_eq!(headless.html(mount), "<button>2</button>");
    assert_eq!(headless.app.scheduler().stats().executed, 2);
}

#[test]
fn test_refs_notify_on_existing_value_key() {
    let (headless, _) = setup();
    let component = headless.app.create_component(
        ComponentDef::new("Input", |scope| {
            let text = scope.reference("value").map(Value::to_attribute_string).unwrap_or_default();
            Ok(VNode::element("input").with_prop("value", text))
        })
        .with_ref("value", ""),
    );
    headless.app.mount(&component, "#app").unwrap();

    component.set_ref("focused", true);
    assert_eq!(headless.app.scheduler().stats().scheduled, 0);

    component.set_ref("value", "typed");
    assert_eq!(headless.app.scheduler().stats().scheduled, 1);
}

#[test]
fn test_invoke_schedules_rerender() {
    let (headless, mount) = setup();
    let component = counter(&headless.app);
    headless.app.mount(&component, "#app").unwrap();

    let doubled = component.invoke(|c| number(c.state("count").as_ref()) * 2.0);
    assert_eq!(doubled, 0.0);
    assert_eq!(headless.app.scheduler().stats().scheduled, 1);
    headless.run_until_settled();
    assert_eq!(headless.html(mount), "<button>0</button>");
}

#[test]
fn test_lifecycle_hooks() {
    let (headless, mount) = setup();
    let component = counter(&headless.app);
    let log = Rc::new(RefCell::new(Vec::new()));
    let recorder = |label: &'static str| {
        let log = log.clone();
        move || log.borrow_mut().push(label)
    };
    component.on_mounted(recorder("mounted"));
    component.on_updated(recorder("updated"));
    component.on_unmounted(recorder("unmounted"));

    headless.app.mount(&component, "#app").unwrap();
    component.update_view().unwrap();
    component.unmount().unwrap();

    assert_eq!(*log.borrow(), vec!["mounted", "updated", "unmounted"]);
    assert!(!component.is_mounted());
    assert!(component.last_rendered().is_none());
    assert_eq!(headless.html(mount), "");
    assert!(matches!(component.update_view(), Err(RuntimeError::NotMounted(_))));
}

#[test]
fn test_mount_twice_is_rejected() {
    let (headless, mount) = setup();
    let component = counter(&headless.app);
    headless.app.mount(&component, mount).unwrap();

    assert!(matches!(
        headless.app.mount(&component, mount),
        Err(RuntimeError::AlreadyMounted(_))
    ));
}

#[test]
fn test_nested_component_receives_props() {
    let (headless, mount) = setup();
    let child = headless.app.create_component(ComponentDef::new("Label", |scope| {
        let text = scope.prop("text").map(Value::to_attribute_string).unwrap_or_default();
        Ok(VNode::element("span").with_child(VNode::text(text)))
    }));
    let mounts = Rc::new(RefCell::new(0));
    let counter = mounts.clone();
    child.on_mounted(move || *counter.borrow_mut() += 1);

    let child_ref = child.reference();
    let parent = headless.app.create_component(
        ComponentDef::new("Parent", move |scope| {
            let label = scope.state("label").cloned().unwrap_or(Value::Null);
            let mut root = VNode::element("section");
            if scope.state("show") != Some(&Value::Bool(false)) {
                root = root.with_child(VNode::component(child_ref.clone().with_prop("text", label)));
            }
            Ok(root)
        })
        .with_state("label", "one"),
    );

    headless.app.mount(&parent, "#app").unwrap();
    assert_eq!(headless.html(mount), "<section><div><span>one</span></div></section>");
    assert!(child.is_mounted());

    parent.set_state("label", "two");
    headless.run_until_settled();
    assert_eq!(headless.html(mount), "<section><div><span>two</span></div></section>");
    assert_eq!(*mounts.borrow(), 1);

    parent.set_state("show", false);
    headless.run_until_settled();
    assert_eq!(headless.html(mount), "<section></section>");
    assert!(!child.is_mounted());
}

#[test]
fn test_render_error_type_is_exposed() {
    let error = RenderError::new("boom");
    assert_eq!(error.to_string(), "boom");
    let runtime: RuntimeError = error.into();
    assert_eq!(runtime.to_string(), "Render failed: boom");
}

#[test]
fn test_unmount_drops_patches_waiting_for_frame() {
    let (headless, mount) = setup();
    let first = headless.app.create_component(
        ComponentDef::new("First", |scope| {
            let n = number(scope.state("n"));
            Ok(VNode::element("p").with_child(VNode::text(format!("A{}", n))))
        })
        .with_state("n", 0),
    );
    let second = headless.app.create_component(ComponentDef::new("Second", |_| {
        Ok(VNode::element("section").with_child(VNode::text("B")))
    }));
    headless.app.mount(&first, "#app").unwrap();

    first.set_state("n", 1);
    headless.idle.run_until_idle(usize::MAX);
    assert_eq!(headless.app.patcher().pending_jobs(), 1);

    first.unmount().unwrap();
    assert_eq!(headless.app.patcher().pending_jobs(), 0);
    headless.app.mount(&second, "#app").unwrap();
    headless.run_until_settled();

    assert_eq!(headless.html(mount), "<section>B</section>");
}
