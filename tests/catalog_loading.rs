use gift_cases::{
    CatalogError,
    CatalogStore,
    Rarity,
    SessionError,
    test_helpers::machine_with_catalog,
};

const CATALOG: &str = r#"{
  "cases": [
    {
      "id": "starter",
      "name": "Starter Case",
      "open_cost": 100,
      "gifts": [
        { "id": "s-bear", "name": "Bear", "rarity": "common", "value": 50, "drop_weight": 3 },
        { "id": "s-ring", "name": "Ring", "rarity": "legendary", "value": 900, "drop_weight": 1 }
      ]
    },
    {
      "id": "broken",
      "name": "Broken Case",
      "open_cost": 100,
      "gifts": [
        { "id": "b-dust", "name": "Dust", "rarity": "common", "value": 1, "drop_weight": 0 }
      ]
    },
    {
      "id": "empty",
      "name": "Empty Case",
      "open_cost": 100,
      "gifts": []
    }
  ]
}"#;

#[test]
fn catalog_file__invalid_cases_are_rejected_not_fatal() {
    // when
    let catalog = CatalogStore::from_json_slice(CATALOG.as_bytes()).unwrap();

    // then
    let ids: Vec<&str> = catalog.cases().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, ["starter"]);
    assert!(catalog.rejected().contains(&CatalogError::ZeroWeight {
        case_id: String::from("broken"),
    }));
    assert!(catalog.rejected().contains(&CatalogError::EmptyPool {
        case_id: String::from("empty"),
    }));
}

#[test]
fn catalog_file__unnormalized_weights_draw_proportionally() {
    // given
    let catalog = CatalogStore::from_json_slice(CATALOG.as_bytes()).unwrap();
    let starter = catalog.get_case("starter").unwrap();
    assert_eq!(starter.drop_chances(), vec![0.75, 0.25]);
    let mut machine = machine_with_catalog(catalog, 1_000, [0.80]);

    // when
    let session = machine.begin("starter").unwrap();
    machine.on_animation_complete(session);

    // then
    let item = &machine.inventory().list()[0];
    assert_eq!(item.gift_id, "s-ring");
    assert_eq!(item.rarity, Rarity::Legendary);
    assert_eq!(machine.balance(), 900);
}

#[test]
fn catalog_file__rejected_case_is_never_offered() {
    let catalog = CatalogStore::from_json_slice(CATALOG.as_bytes()).unwrap();
    let mut machine = machine_with_catalog(catalog, 1_000, [0.10]);

    let result = machine.begin("broken");

    assert!(matches!(result, Err(SessionError::UnknownCase(_))));
    assert_eq!(machine.balance(), 1_000);
}

#[test]
fn catalog_file__malformed_json_is_a_parse_error() {
    let result = CatalogStore::from_json_slice(b"{ \"cases\": [ { \"id\": 7 } ] }");

    assert!(matches!(result, Err(CatalogError::Parse { .. })));
}
