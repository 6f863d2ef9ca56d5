use super::*;

#[test]
fn test_shallow_recursion() {
    fn factorial(n: u64) -> u64 {
        ensure_sufficient_stack(|| if n <= 1 { 1 } else { n * factorial(n - 1) })
    }

    assert_eq!(factorial(10), 3_628_800);
}

#[test]
fn test_deep_recursion() {
    // This would overflow without stack growth
    fn deep_recurse(n: u64) -> u64 {
        ensure_sufficient_stack(|| if n == 0 { 0 } else { deep_recurse(n - 1) + 1 })
    }

    assert_eq!(deep_recurse(100_000), 100_000);
}

#[test]
fn test_works_with_result_type() {
    let result: Result<i32, &str> = ensure_sufficient_stack(|| Ok(123));
    assert_eq!(result, Ok(123));
}

#[test]
fn test_depth_limit_enforced() {
    let mut limit = DepthLimit::new(2);
    assert_eq!(limit.enter(), Ok(1));
    assert_eq!(limit.enter(), Ok(2));
    assert_eq!(limit.enter(), Err(DepthExceeded { limit: 2 }));
    assert_eq!(limit.depth(), 2);

    limit.exit();
    assert_eq!(limit.enter(), Ok(2));
}

#[test]
fn test_depth_limit_exit_saturates() {
    let mut limit = DepthLimit::default();
    limit.exit();
    assert_eq!(limit.depth(), 0);
    assert_eq!(limit.limit(), DepthLimit::DEFAULT_LIMIT);
}

#[test]
fn test_depth_exceeded_message() {
    let err = DepthExceeded { limit: 64 };
    assert_eq!(err.to_string(), "recursion depth limit of 64 exceeded");
}
