use crate::error::RummageError;
use crate::route::Route;
use crate::stopwatch::WorkTime;
use crate::value::Value;

/// A single match: the value and the route taken to reach it.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFound {
    value: Value,
    route: Route,
}

impl DataFound {
    pub fn new(value: Value, route: Route) -> Self {
        Self { value, route }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

/// The terminal outcome of a search session.
///
/// Built only through [`Outcome::success`] and [`Outcome::failure`]: a
/// successful outcome carries at least one match and no error, a failed one
/// carries an error and no matches.
#[derive(Debug, Clone)]
pub struct Outcome {
    found: Vec<DataFound>,
    error: Option<RummageError>,
    work_time: WorkTime,
}

impl Outcome {
    /// # Errors
    ///
    /// [`RummageError::InvalidArgument`] when `found` is empty.
    pub fn success(found: Vec<DataFound>, work_time: WorkTime) -> Result<Self, RummageError> {
        if found.is_empty() {
            return Err(RummageError::invalid(
                "a successful outcome needs at least one value",
            ));
        }
        Ok(Self {
            found,
            error: None,
            work_time,
        })
    }

    pub fn failure(error: RummageError, work_time: WorkTime) -> Self {
        Self {
            found: Vec::new(),
            error: Some(error),
            work_time,
        }
    }

    /// True iff values were found and no error occurred.
    pub fn successfully(&self) -> bool {
        !self.found.is_empty() && self.error.is_none()
    }

    /// Matched values, in discovery order.
    pub fn values(&self) -> Vec<Value> {
        self.found.iter().map(|f| f.value.clone()).collect()
    }

    /// Matches with their routes, in discovery order.
    pub fn found(&self) -> &[DataFound] {
        &self.found
    }

    pub fn error(&self) -> Option<&RummageError> {
        self.error.as_ref()
    }

    /// Wall-clock time from session start to completion.
    pub fn work_time(&self) -> WorkTime {
        self.work_time
    }

    /// Consume into matched values, or the terminal error.
    ///
    /// # Errors
    ///
    /// The failure's error.
    pub fn into_result(self) -> Result<Vec<Value>, RummageError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.found.into_iter().map(DataFound::into_value).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_requires_values() {
        assert!(Outcome::success(Vec::new(), WorkTime::default()).is_err());

        let found = DataFound::new(Value::from(1), Route::new());
        let outcome = Outcome::success(vec![found], WorkTime::default()).unwrap();
        assert!(outcome.successfully());
        assert_eq!(outcome.values(), vec![Value::from(1)]);
        assert!(outcome.error().is_none());
    }

    #[test]
    fn failure_has_no_values() {
        let outcome = Outcome::failure(RummageError::Unresolved, WorkTime::default());
        assert!(!outcome.successfully());
        assert!(outcome.values().is_empty());
        assert_eq!(outcome.into_result(), Err(RummageError::Unresolved));
    }
}
