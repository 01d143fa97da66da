/// Submit a function together with its arguments
///
/// The arguments are evaluated on the calling thread and moved into the task,
/// so the function runs on a worker with owned copies.
///
/// # Examples
/// ```rust
/// use ring_pool::{ThreadPool, submit};
///
/// fn scale(value: u64, factor: u64) -> u64 {
///     value * factor
/// }
///
/// let pool = ThreadPool::new(2, 4).unwrap();
/// let handle = submit!(pool, scale, 21, 2);
/// assert_eq!(handle.wait(), Ok(42));
/// ```
#[macro_export]
macro_rules! submit {
    ($pool:expr, $func:expr $(, $arg:expr)* $(,)?) => {{
        let func = $func;
        $crate::__bind_args!($pool, func, [] $(, $arg)*)
    }};
}

// Evaluates each argument into a fresh binding before moving them into the closure.
#[doc(hidden)]
#[macro_export]
macro_rules! __bind_args {
    ($pool:expr, $func:ident, [$($bound:ident)*]) => {
        $pool.submit(move || $func($($bound),*))
    };
    ($pool:expr, $func:ident, [$($bound:ident)*], $arg:expr $(, $rest:expr)*) => {{
        let arg = $arg;
        $crate::__bind_args!($pool, $func, [$($bound)* arg] $(, $rest)*)
    }};
}
