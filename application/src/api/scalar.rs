//! GraphQL scalar definitions.

use std::{fmt, marker::PhantomData, str::FromStr};

use juniper::{
    GraphQLType, InputValue, ParseScalarResult, ParseScalarValue, ScalarToken,
    ScalarValue, Value,
};

/// Helper type to use in `#[graphql(with = ..)]` attribute of a GraphQL
/// scalar wrapping a validated domain string, like a `Product` name.
///
/// The domain type `D` is printed with its [`Display`] impl and parsed with
/// its [`FromStr`] one, so its validation rules apply to GraphQL input as is.
///
/// [`Display`]: fmt::Display
#[derive(Debug)]
pub struct Via<D>(PhantomData<D>);

impl<D> Via<D> {
    /// Prints the wrapped domain value as a string [`Value`].
    pub fn to_output<T, S>(value: &T) -> Value<S>
    where
        D: fmt::Display,
        T: AsRef<D>,
        S: ScalarValue,
    {
        Value::scalar(value.as_ref().to_string())
    }

    /// Parses the wrapped domain value out of a string [`InputValue`].
    ///
    /// # Errors
    ///
    /// If the `input` is not a string or is rejected by the domain type.
    pub fn from_input<T, S>(input: &InputValue<S>) -> Result<T, String>
    where
        D: FromStr,
        D::Err: fmt::Display,
        T: From<D> + GraphQLType<S, TypeInfo = ()>,
        S: ScalarValue,
    {
        let name = T::name(&()).unwrap_or("String");
        let s = input.as_string_value().ok_or_else(|| {
            format!("Expected `{name}` string, found: {input}")
        })?;
        s.parse::<D>()
            .map(T::from)
            .map_err(|e| format!("Invalid `{name}` \"{s}\": {e}"))
    }

    /// Parses the provided [`ScalarToken`] as a string.
    ///
    /// # Errors
    ///
    /// If the token is not a string.
    pub fn parse_token<S: ScalarValue>(
        value: ScalarToken<'_>,
    ) -> ParseScalarResult<S> {
        <String as ParseScalarValue<S>>::from_str(value)
    }
}

#[cfg(test)]
mod spec {
    use juniper::{DefaultScalarValue, InputValue};

    use crate::api::product::Name;

    use super::Via;

    type Input = InputValue<DefaultScalarValue>;

    #[test]
    fn parses_valid_domain_string() {
        let name: Name =
            Via::<service::domain::product::Name>::from_input(
                &Input::scalar("Espresso"),
            )
            .unwrap();

        assert_eq!(name.to_string(), "Espresso");
    }

    #[test]
    fn rejects_invalid_domain_string() {
        let err = Via::<service::domain::product::Name>::from_input::<Name, _>(
            &Input::scalar(" Espresso"),
        )
        .unwrap_err();
        assert!(err.contains("ProductName"), "{err}");

        let err = Via::<service::domain::product::Name>::from_input::<Name, _>(
            &Input::scalar(42),
        )
        .unwrap_err();
        assert!(err.contains("Expected"), "{err}");
    }
}
