use modelx_core::errors::{ErrorCategory, ExError, ExErrorKind, ModelXError};

#[test]
fn test_element_not_found_verifiable_by_kind() {
    let err = ModelXError::ElementNotFound {
        element_id: "missing".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::NotFound);
    assert_eq!(ex_err.code(), "ERR_NOT_FOUND");
    assert_eq!(ex_err.element_id(), Some("missing"));
    assert!(ex_err.message().contains("Element not found"));
}

#[test]
fn test_nested_begin_names_both_operations() {
    let err = ModelXError::OperationInProgress {
        name: "inner".to_string(),
        current: "outer".to_string(),
    };
    assert_eq!(err.category(), ErrorCategory::Contract);

    let ex_err: ExError = err.into();
    assert_eq!(ex_err.kind(), ExErrorKind::OperationInProgress);
    assert_eq!(ex_err.op(), Some("inner"));
    assert!(ex_err.message().contains("outer"));
}

#[test]
fn test_collection_contract_errors_carry_field() {
    let err = ModelXError::ValueNotInCollection {
        element_id: "e".to_string(),
        field: "items".to_string(),
        value: "v9".to_string(),
    };
    assert_eq!(err.category(), ErrorCategory::Contract);

    let ex_err: ExError = err.into();
    assert_eq!(ex_err.kind(), ExErrorKind::ContractViolation);
    assert_eq!(ex_err.field(), Some("items"));
    assert_eq!(
        ex_err.to_string(),
        "[ERR_CONTRACT_VIOLATION]: Value v9 is not in e.items (element_id: e) (field: items)"
    );
}

#[test]
fn test_structural_errors_are_data_errors() {
    let errors = vec![
        ModelXError::OwnershipCycle {
            element_id: "a".to_string(),
            parent_id: "b".to_string(),
        },
        ModelXError::SlotOccupied {
            element_id: "a".to_string(),
            field: "main".to_string(),
        },
        ModelXError::NothingToUndo,
        ModelXError::UnknownType {
            type_name: "Ghost".to_string(),
        },
    ];

    for err in errors {
        assert_eq!(err.category(), ErrorCategory::Data, "{}", err);
    }
}

#[test]
fn test_error_kind_code_mapping() {
    let kinds = vec![
        (ExErrorKind::ContractViolation, "ERR_CONTRACT_VIOLATION"),
        (ExErrorKind::NoOperation, "ERR_NO_OPERATION"),
        (ExErrorKind::UnknownAttributeKind, "ERR_UNKNOWN_ATTRIBUTE_KIND"),
        (ExErrorKind::UnknownType, "ERR_UNKNOWN_TYPE"),
        (ExErrorKind::CycleDetected, "ERR_CYCLE_DETECTED"),
        (ExErrorKind::MultipleParents, "ERR_MULTIPLE_PARENTS"),
        (ExErrorKind::ReplayFailed, "ERR_REPLAY_FAILED"),
        (ExErrorKind::NothingToReplay, "ERR_NOTHING_TO_REPLAY"),
        (ExErrorKind::Config, "ERR_CONFIG"),
    ];

    for (kind, expected_code) in kinds {
        assert_eq!(kind.code(), expected_code);
    }
}

#[test]
fn test_source_chain() {
    let inner = ExError::new(ExErrorKind::NotFound).with_message("gone");
    let outer = ExError::new(ExErrorKind::ReplayFailed)
        .with_op("undo")
        .with_source(inner);

    assert_eq!(outer.source_error().map(ExError::kind), Some(ExErrorKind::NotFound));
    let source = std::error::Error::source(&outer).unwrap();
    assert_eq!(source.to_string(), "[ERR_NOT_FOUND]: gone");
}
