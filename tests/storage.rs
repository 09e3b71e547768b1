use qadd::op::storage::{infer_storage_type, DispatchMode};
use qadd::{QaddError, StorageType};

#[test]
fn dense_inputs_dispatch_to_kernel() {
    let mut ins = [StorageType::Default; 6];
    ins[2] = StorageType::Undefined;
    let mut outs = [StorageType::Undefined; 3];
    assert_eq!(infer_storage_type(&mut ins, &mut outs).unwrap(), DispatchMode::ComputeEx);
    assert!(ins.iter().all(|s| *s == StorageType::Default));
    assert!(outs.iter().all(|s| *s == StorageType::Default));
}

#[test]
fn sparse_input_is_rejected() {
    let mut ins = [StorageType::Default; 6];
    ins[1] = StorageType::RowSparse;
    let mut outs = [StorageType::Undefined; 3];
    let err = infer_storage_type(&mut ins, &mut outs).unwrap_err();
    assert_eq!(err, QaddError::UnsupportedStorage { what: "input", stype: StorageType::RowSparse });
}

#[test]
fn sparse_output_is_rejected() {
    let mut ins = [StorageType::Default; 6];
    let mut outs = [StorageType::Default, StorageType::Csr, StorageType::Default];
    let err = infer_storage_type(&mut ins, &mut outs).unwrap_err();
    assert_eq!(err, QaddError::UnsupportedStorage { what: "output", stype: StorageType::Csr });
}

#[test]
fn wrong_slot_counts_are_arity_errors() {
    let mut ins = [StorageType::Default; 4];
    let mut outs = [StorageType::Default; 3];
    assert!(matches!(infer_storage_type(&mut ins, &mut outs), Err(QaddError::Arity { expected: 6, actual: 4, .. })));
    let mut ins = [StorageType::Default; 6];
    let mut outs = [StorageType::Default; 1];
    assert!(matches!(infer_storage_type(&mut ins, &mut outs), Err(QaddError::Arity { expected: 3, actual: 1, .. })));
}
