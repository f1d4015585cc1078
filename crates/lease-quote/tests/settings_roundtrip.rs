use lease_quote::pricing::{
    parse_rate_csv, BelowFloorPolicy, LeaseSettings, RateMatrix, SettingsCommand,
};
use rust_decimal_macros::dec;

fn customised() -> LeaseSettings {
    let mut settings = LeaseSettings::default();
    let commands = vec![
        SettingsCommand::SetBaseRate { rate: dec!(2.25) },
        SettingsCommand::ReplaceRatio {
            from: dec!(0.2),
            to: dec!(0.25),
        },
        SettingsCommand::SetRate {
            ratio: dec!(0.25),
            term: 6,
            offset: dec!(0),
        },
        SettingsCommand::SetServiceCost {
            floor: 1000,
            fee: dec!(0),
        },
        SettingsCommand::SetBelowFloorPolicy {
            policy: BelowFloorPolicy::Reject,
        },
        SettingsCommand::ClearTermGate { term: 12 },
    ];
    for command in commands {
        settings.apply(command).expect("command accepted");
    }
    settings
}

#[test]
fn json_export_restores_identical_settings() {
    let settings = customised();
    let exported = settings.export_json().expect("exports");

    let restored = LeaseSettings::from_json(&exported).expect("parses");
    assert!(restored.notes.is_empty(), "unexpected repairs: {:?}", restored.notes);
    assert_eq!(restored.settings, settings);
    assert_eq!(restored.settings.rate_table().get(dec!(0.25), 6), Some(dec!(0)));
}

#[test]
fn legacy_documents_without_new_fields_are_repaired() {
    let legacy = r#"{
        "base_rate": "1.5",
        "down_payment_ratios": ["0.3", "0.5", "0.3"],
        "lease_terms": [6, 10],
        "rate_table": { "0.3": { "6": "20" } }
    }"#;

    let repaired = LeaseSettings::from_json(legacy).expect("parses");
    let settings = repaired.settings;

    assert_eq!(settings.down_payment_ratios(), &[dec!(0.3), dec!(0.5)]);
    assert_eq!(settings.rate_table().len(), 1);
    assert_eq!(settings.service_costs().fee(8700), dec!(236));
    assert_eq!(settings.term_gates().threshold(12), Some(dec!(0.35)));
    assert!(repaired
        .notes
        .iter()
        .any(|note| note.field == "down_payment_ratios"));
    assert!(repaired.notes.iter().any(|note| note.field == "term_gates"));
}

#[test]
fn rate_sheet_round_trips_through_csv() {
    let settings = customised();
    let matrix = RateMatrix::from_settings(&settings);

    let mut sheet = Vec::new();
    matrix.write_csv(&mut sheet).expect("csv written");
    let text = String::from_utf8(sheet.clone()).expect("utf8");
    assert!(text.starts_with("ratio,6,10,12\n"));

    let mut rebuilt = LeaseSettings::default();
    for command in parse_rate_csv(sheet.as_slice()).expect("csv parses") {
        rebuilt.apply(command).expect("cell accepted");
    }

    for ratio in settings.down_payment_ratios() {
        for term in settings.lease_terms() {
            assert_eq!(
                lease_quote::pricing::resolve_rate(
                    *ratio,
                    *term,
                    rebuilt.rate_table(),
                    rebuilt.base_rate()
                ),
                lease_quote::pricing::resolve_rate(
                    *ratio,
                    *term,
                    settings.rate_table(),
                    settings.base_rate()
                ),
            );
        }
    }
}
