use screenwalk_ident::parse::{parse_descriptor, ParseError};
use screenwalk_ident::compute_screen_id;

#[test]
fn test_parse_descriptor_from_file() {
    let json_str = include_str!("fixtures/login_screen.json");
    let descriptor = parse_descriptor(json_str).unwrap();
    assert_eq!(descriptor.package_name, "com.example.shop");
    assert_eq!(descriptor.elements.len(), 4);
    assert_eq!(
        descriptor.screen_id(),
        compute_screen_id("com.example.shop.auth.LoginActivity", "com.example.shop")
    );
}

#[test]
fn test_parse_assigns_element_ids() {
    let json_str = include_str!("fixtures/login_screen.json");
    let descriptor = parse_descriptor(json_str).unwrap();
    let ids: Vec<&str> = descriptor
        .elements
        .iter()
        .map(|e| e.element_id.as_str())
        .collect();
    assert_eq!(ids[0], "username_edittext");
    assert_eq!(ids[1], "sign_in_sign_in_button");
    assert_eq!(ids[2], "remember_me_remember_me_checkbox");
    // Anonymous scroll container: center (540, 1000), size (1080, 1600).
    assert_eq!(ids[3], "scrollview_540_1000_1080_1600");
    assert!(descriptor.find_element("username_edittext").is_some());
}

#[test]
fn test_parse_keeps_supplied_element_id() {
    let json = r#"{
        "package_name": "com.example",
        "activity": ".Main",
        "elements": [
            { "element_id": "custom", "class_name": "android.view.View" }
        ]
    }"#;
    let descriptor = parse_descriptor(json).unwrap();
    assert_eq!(descriptor.elements[0].element_id, "custom");
}

#[test]
fn test_parse_invalid_json() {
    let result = parse_descriptor("not json at all");
    assert!(matches!(result, Err(ParseError::Json(_))));
}

#[test]
fn test_parse_rejects_empty_activity() {
    let json = r#"{ "package_name": "com.example", "activity": "  " }"#;
    let result = parse_descriptor(json);
    assert!(matches!(result, Err(ParseError::MissingField("activity"))));
}

#[test]
fn test_parse_empty_element_list() {
    let json = r#"{ "package_name": "com.example", "activity": ".Empty" }"#;
    let descriptor = parse_descriptor(json).unwrap();
    assert!(descriptor.elements.is_empty());
}
