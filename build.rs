use std::path::Path;

fn main() {
    let catalog_path = Path::new("catalogs/protocols.json");
    validate_catalog_file(catalog_path);
    set_build_dependencies();
}

fn validate_catalog_file(catalog_path: &Path) {
    // Ensure catalog exists at build time
    assert!(
        catalog_path.exists(),
        "\n\nCATALOG BUILD ERROR: File not found\n\
         Path: {}\n\
         Please create the protocol catalog before building.\n",
        catalog_path.display()
    );

    let catalog_contents = std::fs::read_to_string(catalog_path).unwrap_or_else(|e| {
        panic!(
            "\n\nCATALOG BUILD ERROR: Failed to read file\n\
             Path: {}\n\
             Error: {e}\n",
            catalog_path.display()
        );
    });

    let catalog: serde_json::Value = serde_json::from_str(&catalog_contents).unwrap_or_else(|e| {
        panic!(
            "\n\nCATALOG BUILD ERROR: Invalid JSON\n\
             Path: {}\n\
             Error: {e}\n\
             Hint: Check for missing commas, brackets, or invalid syntax.\n",
            catalog_path.display()
        );
    });

    validate_catalog_structure(&catalog);
}

fn validate_catalog_structure(catalog: &serde_json::Value) {
    assert!(
        catalog.is_object(),
        "\n\nCATALOG BUILD ERROR: Root must be a JSON object\n\
         Got: {catalog}\n"
    );

    // Wrapped form when `protocols` maps ids to objects, otherwise a bare id -> protocol map
    let wrapped = catalog
        .get("protocols")
        .and_then(serde_json::Value::as_object)
        .filter(|protocols| protocols.values().all(serde_json::Value::is_object));
    let protocols = match wrapped {
        Some(protocols) => protocols,
        None => catalog.as_object().unwrap_or_else(|| {
            panic!("\n\nCATALOG BUILD ERROR: Root must be a JSON object\n");
        }),
    };

    assert!(
        !protocols.is_empty(),
        "\n\nCATALOG BUILD ERROR: Catalog contains no protocols\n"
    );

    for (index, (id, protocol)) in protocols.iter().enumerate() {
        validate_protocol(id, protocol, index);
    }

    println!(
        "cargo:warning=Validated catalog: {} protocols",
        protocols.len()
    );
}

fn validate_protocol(id: &str, protocol: &serde_json::Value, index: usize) {
    assert!(
        !id.is_empty()
            && id.len() <= 128
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')),
        "\n\nCATALOG BUILD ERROR: Protocol at index {index} has invalid id '{id}'\n\
         Hint: ids use 1-128 of A-Z a-z 0-9 _ - .\n"
    );

    let name = protocol
        .get("name")
        .or_else(|| protocol.get("title"))
        .and_then(serde_json::Value::as_str);
    assert!(
        name.is_some_and(|n| !n.trim().is_empty()),
        "\n\nCATALOG BUILD ERROR: Protocol '{id}' (index {index}) missing 'name' field\n"
    );

    assert!(
        protocol.get("content").is_some_and(serde_json::Value::is_string),
        "\n\nCATALOG BUILD ERROR: Protocol '{id}' (index {index}) missing 'content' field\n"
    );

    if let Some(categories) = protocol.get("categories") {
        let all_strings = categories
            .as_array()
            .is_some_and(|tags| tags.iter().all(serde_json::Value::is_string));
        assert!(
            all_strings,
            "\n\nCATALOG BUILD ERROR: Protocol '{id}' 'categories' must be an array of strings\n"
        );

        for category in categories.as_array().into_iter().flatten().filter_map(|c| c.as_str()) {
            let category = category.trim().to_lowercase();
            assert!(
                category.len() <= 64
                    && category
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_')),
                "\n\nCATALOG BUILD ERROR: Protocol '{id}' has invalid category '{category}'\n\
                 Hint: categories use up to 64 of a-z 0-9 _ -\n"
            );
        }
    }
}

fn set_build_dependencies() {
    // Tell cargo to rerun if catalog changes
    println!("cargo:rerun-if-changed=catalogs/protocols.json");

    // Tell cargo to rerun if build.rs changes
    println!("cargo:rerun-if-changed=build.rs");
}
