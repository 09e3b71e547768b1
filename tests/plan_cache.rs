use qadd::op::cache::{cache_stats, clear_cache, CacheStats};
use qadd::{quantized_elemwise_add, DType, OpReq, QuantizeElemwiseAddParam, Tensor};

fn call(param: &QuantizeElemwiseAddParam, a: Vec<i8>, b: Vec<i8>, a_abs: f32, b_abs: f32) {
    let shape = [a.len()];
    let inputs = vec![
        Tensor::from_i8(&shape, a).unwrap(),
        Tensor::from_i8(&shape, b).unwrap(),
        Tensor::scalar(-a_abs),
        Tensor::scalar(a_abs),
        Tensor::scalar(-b_abs),
        Tensor::scalar(b_abs),
    ];
    let outputs = vec![Tensor::zeros(&shape, DType::Int8), Tensor::scalar(0.0), Tensor::scalar(0.0)];
    quantized_elemwise_add(param, &inputs, &[OpReq::WriteTo], &outputs).unwrap();
}

#[test]
fn identical_key_with_different_data_reuses_plan() {
    clear_cache();
    let p = QuantizeElemwiseAddParam::default();
    call(&p, vec![1, 2, 3, 4], vec![5, 6, 7, 8], 1.0, 2.0);
    call(&p, vec![-9, 0, 9, 100], vec![-128, 127, 0, 1], 1.0, 2.0);
    assert_eq!(cache_stats(), CacheStats { entries: 1, builds: 1, hits: 1 });
}

#[test]
fn changed_range_or_shape_builds_new_plan() {
    clear_cache();
    let p = QuantizeElemwiseAddParam::default();
    call(&p, vec![1; 4], vec![1; 4], 1.0, 2.0);
    call(&p, vec![1; 4], vec![1; 4], 1.0, 3.0);
    call(&p, vec![1; 5], vec![1; 5], 1.0, 3.0);
    call(&p, vec![1; 5], vec![1; 5], 1.0, 3.0);
    assert_eq!(cache_stats(), CacheStats { entries: 3, builds: 3, hits: 1 });
}

#[test]
fn calibration_is_part_of_the_key() {
    clear_cache();
    // dynamic output range is +-3, same as the calibrated one
    call(&QuantizeElemwiseAddParam::default(), vec![1; 4], vec![1; 4], 1.0, 2.0);
    call(&QuantizeElemwiseAddParam::calibrated(-3.0, 3.0), vec![1; 4], vec![1; 4], 1.0, 2.0);
    call(&QuantizeElemwiseAddParam::calibrated(-4.0, 4.0), vec![1; 4], vec![1; 4], 1.0, 2.0);
    call(&QuantizeElemwiseAddParam::calibrated(-4.0, 4.0), vec![2; 4], vec![2; 4], 1.0, 2.0);
    assert_eq!(cache_stats(), CacheStats { entries: 3, builds: 3, hits: 1 });
}

#[test]
fn clear_drops_plans() {
    clear_cache();
    let p = QuantizeElemwiseAddParam::default();
    call(&p, vec![1; 4], vec![1; 4], 1.0, 2.0);
    clear_cache();
    assert_eq!(cache_stats(), CacheStats::default());
    call(&p, vec![1; 4], vec![1; 4], 1.0, 2.0);
    assert_eq!(cache_stats().builds, 1);
}

#[test]
fn each_worker_thread_builds_its_own_plan() {
    let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
    let stats = pool.broadcast(|_| {
        clear_cache();
        let p = QuantizeElemwiseAddParam::default();
        for i in 0..3i8 {
            call(&p, vec![i; 16], vec![-i; 16], 1.0, 2.0);
        }
        cache_stats()
    });
    assert_eq!(stats.len(), 4);
    for s in stats {
        assert_eq!(s, CacheStats { entries: 1, builds: 1, hits: 2 });
    }
}
