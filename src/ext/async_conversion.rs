/// Fallible conversion that has to await I/O to complete.
///
/// The filesystem layer uses this to turn a path into the status the mirror
/// tree records for it:
///
/// ```ignore
/// let status = EntryStatus::async_try_from(path).await?;
/// ```
pub trait AsyncTryFrom<T>: Sized {
    /// The error type that can occur during conversion.
    type Error;

    /// Performs the fallible asynchronous conversion from `T` to `Self`.
    async fn async_try_from(value: T) -> Result<Self, Self::Error>;
}

/// Async counterpart to `TryInto<T>`.
pub trait AsyncTryInto<T> {
    /// The error type that can occur during conversion.
    type Error;

    /// Performs the fallible asynchronous conversion from `Self` to `T`.
    async fn async_try_into(self) -> Result<T, Self::Error>;
}

/// Blanket implementation for `AsyncTryInto<U>` when `U` implements `AsyncTryFrom<T>`.
impl<T, U> AsyncTryInto<U> for T
where
    U: AsyncTryFrom<T>,
{
    type Error = U::Error;

    async fn async_try_into(self) -> Result<U, Self::Error> {
        U::async_try_from(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Port(u16);

    impl AsyncTryFrom<&str> for Port {
        type Error = std::num::ParseIntError;

        async fn async_try_from(value: &str) -> Result<Self, Self::Error> {
            Ok(Port(value.parse()?))
        }
    }

    #[test]
    fn test_async_try_from_success() {
        futures::executor::block_on(async {
            let port = Port::async_try_from("8080").await.unwrap();
            assert_eq!(port.0, 8080);
        });
    }

    #[test]
    fn test_async_try_into_failure() {
        futures::executor::block_on(async {
            let result: Result<Port, _> = "not a port".async_try_into().await;
            assert!(result.is_err());
        });
    }
}
