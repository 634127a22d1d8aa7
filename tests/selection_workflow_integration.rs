//! Integration tests for catalog selection
//!
//! Selection edits go through the same watch-list file the refresh loop
//! reads, so each test checks both the persisted text and what a refresh
//! shows afterwards.

mod common;

use common::builders::{gpio_device, Workspace};
use common::mock_helpers::gpio_memory;
use common::value_of;
use regwatch_rs::RegWatchError;

fn outcomes(ws: &Workspace, names: &[&str]) -> Vec<String> {
    ws.session()
        .select(names)
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect()
}

#[test]
fn test_select_peripheral_watches_its_registers() {
    let ws = Workspace::with_watch_list(&gpio_device(), "chip.json\n");
    assert_eq!(outcomes(&ws, &["GPIOA"]), vec!["GPIOA enabled"]);
    assert_eq!(
        ws.read_watch_list(),
        "chip.json\nGPIOA.MODER _ 0x40020000\nGPIOA.ODR _ 0x40020014\n"
    );

    let lines = ws.session().render(80, &mut gpio_memory()).unwrap();
    assert_eq!(value_of(&lines, "MODER"), Some("0xa8000000"));
    assert_eq!(value_of(&lines, "ODR"), Some("0x00000000"));
}

#[test]
fn test_register_completing_peripheral_reports_peripheral() {
    let ws = Workspace::with_watch_list(&gpio_device(), "chip.json\nGPIOA.ODR _ 0x40020014\n");
    assert_eq!(outcomes(&ws, &["GPIOA.MODER"]), vec!["GPIOA enabled"]);
    // Saved in catalog order, fields following their register
    assert_eq!(
        ws.read_watch_list(),
        "chip.json\n\
         GPIOA.MODER _ 0x40020000\n\
         GPIOA.MODER.MODE0 _ 0x40020000 0 2\n\
         GPIOA.MODER.MODE1 _ 0x40020000 2 2\n\
         GPIOA.ODR _ 0x40020014\n"
    );

    assert_eq!(outcomes(&ws, &["GPIOA.MODER"]), vec!["GPIOA.MODER disabled"]);
    assert_eq!(ws.read_watch_list(), "chip.json\nGPIOA.ODR _ 0x40020014\n");
}

#[test]
fn test_peripheral_round_trip_restores_registers() {
    let ws = Workspace::with_watch_list(&gpio_device(), "chip.json\nGPIOA.ODR _ 0x40020014\n");
    assert_eq!(
        outcomes(&ws, &["GPIOA", "GPIOA"]),
        vec!["GPIOA enabled", "GPIOA disabled"]
    );
    assert_eq!(ws.read_watch_list(), "chip.json\nGPIOA.ODR _ 0x40020014\n");
}

#[test]
fn test_entries_outside_catalog_survive_selection() {
    let ws = Workspace::with_watch_list(&gpio_device(), "chip.json\nGPIOZ.FOO foo 0x50000000\n");
    assert_eq!(outcomes(&ws, &["TIM2.CNT"]), vec!["TIM2 enabled"]);
    assert_eq!(
        ws.read_watch_list(),
        "chip.json\nTIM2.CNT _ 0x40000024\nGPIOZ.FOO foo 0x50000000\n"
    );

    let lines = ws.session().render(80, &mut gpio_memory()).unwrap();
    assert_eq!(value_of(&lines, "foo"), Some("0x00000000"));
}

#[test]
fn test_colliding_registers_stay_addressable() {
    let ws = Workspace::with_watch_list(&gpio_device(), "chip.json\n");
    outcomes(&ws, &["GPIOA.MODER", "GPIOB.MODER"]);

    let mut session = ws.session();
    let lines = session.render(80, &mut gpio_memory()).unwrap();
    assert_eq!(value_of(&lines, "MODER"), Some("0xa8000000"));
    assert_eq!(value_of(&lines, "GPIOB.MODER"), Some("0x00000280"));
    assert_eq!(value_of(&lines, "GPIOB.MODER.MODE1"), Some("0x0"));

    session.remove_entry("GPIOB.MODER").unwrap();
    assert!(!ws.read_watch_list().contains("GPIOB.MODER "));
}

#[test]
fn test_alias_set_and_cleared() {
    let ws = Workspace::with_watch_list(&gpio_device(), "chip.json\n");
    let mut session = ws.session();
    session.select(&["GPIOA.MODER"]).unwrap();

    session.set_alias("GPIOA.MODER.MODE1", "m1").unwrap();
    assert!(ws
        .read_watch_list()
        .contains("GPIOA.MODER.MODE1 m1 0x40020000 2 2\n"));
    let lines = session.render(80, &mut gpio_memory()).unwrap();
    assert_eq!(value_of(&lines, "m1"), Some("0x0"));

    session.set_alias("GPIOA.MODER.MODE1", "").unwrap();
    assert!(ws
        .read_watch_list()
        .contains("GPIOA.MODER.MODE1 _ 0x40020000 2 2\n"));

    assert!(matches!(
        session.set_alias("GPIOA", "gpio"),
        Err(RegWatchError::Selection(_))
    ));
}

#[test]
fn test_tree_shows_selection_marks() {
    let ws = Workspace::with_watch_list(
        &gpio_device(),
        "chip.json\nGPIOB.MODER.MODE0 b0 0x40020400 0 2\n",
    );
    let tree = ws.session().render_catalog_tree(Some("GPIOB")).unwrap();
    assert!(tree[0].starts_with("[ ] GPIOB  0x40020400"));
    assert_eq!(tree[1], "    [ ] MODER  0x40020400");
    assert_eq!(tree[2], "        [x] MODE0 (b0)  [1:0]");
    assert_eq!(tree[3], "        [ ] MODE1  [3:2]");

    let full = ws.session().render_catalog_tree(None).unwrap();
    assert_eq!(full.len(), 14);
}

#[test]
fn test_unknown_name_leaves_list_untouched() {
    let content = "chip.json\nGPIOA.ODR _ 0x40020014\n";
    let ws = Workspace::with_watch_list(&gpio_device(), content);
    let err = ws.session().select(&["GPIOA.MODER", "GPIOC"]).unwrap_err();
    assert!(matches!(err, RegWatchError::NotFound(_)));
    assert_eq!(ws.read_watch_list(), content);
}
