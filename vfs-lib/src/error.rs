/// declares a `Context` trait for attaching a message to a failed `Result`
/// or an empty `Option` while converting it into the given error type.
#[macro_export]
macro_rules! context_trait {
    ($e:path) => {
        pub trait Context<T, E> {
            fn context<C>(self, cxt: C) -> std::result::Result<T, $e>
            where
                C: Into<String>;
        }
    };
}
