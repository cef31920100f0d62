use xmlmap::{ErrorKind, ParseOptions, TreeBuilder, Value};

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn streaming(depth: usize) -> ParseOptions {
    ParseOptions {
        item_depth: depth,
        ..ParseOptions::default()
    }
}

#[test]
fn test_depth_one_fires_per_child_of_root() -> Result<(), Box<dyn std::error::Error>> {
    let mut items = Vec::new();
    let result = TreeBuilder::new(streaming(1))
        .with_item_callback(|path, item| {
            let names: Vec<_> = path.iter().map(|p| p.name.as_str().to_string()).collect();
            items.push((names.join("/"), item.clone()));
            true
        })
        .parse("<root><item>A</item><item>B</item></root>")?;
    assert!(result.is_null());
    assert_eq!(
        items,
        vec![
            ("root/item".to_string(), text("A")),
            ("root/item".to_string(), text("B")),
        ]
    );
    Ok(())
}

#[test]
fn test_depth_two_fires_per_grandchild() -> Result<(), Box<dyn std::error::Error>> {
    let mut items = Vec::new();
    TreeBuilder::new(streaming(2))
        .with_item_callback(|path, item| {
            items.push((path.len(), item.clone()));
            true
        })
        .parse("<db><table><row>1</row><row>2</row></table></db>")?;
    assert_eq!(items, vec![(3, text("1")), (3, text("2"))]);
    Ok(())
}

#[test]
fn test_depth_zero_builds_whole_tree() -> Result<(), Box<dyn std::error::Error>> {
    let mut calls = 0;
    let tree = TreeBuilder::new(streaming(0))
        .with_item_callback(|_path, _item| {
            calls += 1;
            true
        })
        .parse("<a><b>1</b></a>")?;
    assert_eq!(calls, 0);
    assert_eq!(tree.get("a").and_then(|a| a.get("b")), Some(&text("1")));
    Ok(())
}

#[test]
fn test_callback_false_interrupts() {
    let mut calls = 0;
    let err = TreeBuilder::new(streaming(1))
        .with_item_callback(|_path, _item| {
            calls += 1;
            false
        })
        .parse("<root><item>A</item><item>B</item></root>")
        .unwrap_err();
    assert!(err.is_interrupted());
    assert_eq!(err.kind(), &ErrorKind::ParsingInterrupted);
    assert_eq!(calls, 1);
}

#[test]
fn test_subtrees_are_complete() -> Result<(), Box<dyn std::error::Error>> {
    let mut items = Vec::new();
    TreeBuilder::new(streaming(1))
        .with_item_callback(|_path, item| {
            items.push(item.clone());
            true
        })
        .parse(
            "<feed>\
             <entry><title>first</title><tag>x</tag><tag>y</tag></entry>\
             <entry><title>second</title></entry>\
             </feed>",
        )?;
    assert_eq!(items.len(), 2);
    assert_eq!(
        items[0].get("tag"),
        Some(&Value::List(vec![text("x"), text("y")]))
    );
    assert_eq!(items[1].get("title"), Some(&text("second")));
    Ok(())
}

#[test]
fn test_path_carries_ancestor_attributes() -> Result<(), Box<dyn std::error::Error>> {
    let mut roots = Vec::new();
    TreeBuilder::new(streaming(1))
        .with_item_callback(|path, _item| {
            let root = &path[0];
            roots.push((
                root.name.clone(),
                root.attrs
                    .as_ref()
                    .and_then(|a| a.get("version"))
                    .cloned(),
            ));
            true
        })
        .parse("<export version=\"2\"><row>1</row></export>")?;
    assert_eq!(roots, vec![("export".to_string(), Some(text("2")))]);
    Ok(())
}

#[test]
fn test_empty_item_is_null() -> Result<(), Box<dyn std::error::Error>> {
    let mut items = Vec::new();
    TreeBuilder::new(streaming(1))
        .with_item_callback(|_path, item| {
            items.push(item.clone());
            true
        })
        .parse("<root><item/></root>")?;
    assert_eq!(items, vec![Value::Null]);
    Ok(())
}

#[test]
fn test_item_text_not_stripped() -> Result<(), Box<dyn std::error::Error>> {
    // Text-only items are handed over verbatim; stripping applies
    // when text is merged into a parent node, which never happens for
    // the streamed subtree root itself
    let mut items = Vec::new();
    TreeBuilder::new(streaming(1))
        .with_item_callback(|_path, item| {
            items.push(item.clone());
            true
        })
        .parse("<root><item> padded </item></root>")?;
    assert_eq!(items, vec![text(" padded ")]);
    Ok(())
}

#[test]
fn test_streaming_interrupt_position() {
    let err = TreeBuilder::new(streaming(1))
        .with_item_callback(|_path, _item| false)
        .parse("<root><item>A</item></root>")
        .unwrap_err();
    // Interruption is cooperative, not a syntax failure
    assert!(err.is_interrupted());
}

#[test]
fn test_many_items_constant_tree() -> Result<(), Box<dyn std::error::Error>> {
    let mut xml = String::from("<log>");
    for i in 0..1000 {
        xml.push_str(&format!("<line n=\"{i}\">entry</line>"));
    }
    xml.push_str("</log>");
    let mut count = 0;
    let result = TreeBuilder::new(streaming(1))
        .with_item_callback(|_path, _item| {
            count += 1;
            true
        })
        .parse(&xml)?;
    assert!(result.is_null());
    assert_eq!(count, 1000);
    Ok(())
}
