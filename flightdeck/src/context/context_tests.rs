//! Tests for the context module.

#[cfg(test)]
mod tests {
    use crate::context::{keys, FlightContext, FlightId, FlightMap, WorkingMap};
    use crate::core::Direction;
    use crate::errors::FlightError;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    #[test]
    fn test_flight_id_generate_is_unique() {
        let a = FlightId::generate();
        let b = FlightId::generate();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn test_flight_id_serializes_transparently() {
        let id = FlightId::new("flight-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""flight-1""#);
    }

    #[test]
    fn test_flight_map_typed_round_trip() {
        let id = Uuid::new_v4();
        let mut map = FlightMap::new();
        map.put(keys::DATASET_ID, &id).unwrap();

        let read: Uuid = map.require(keys::DATASET_ID).unwrap();
        assert_eq!(read, id);
    }

    #[test]
    fn test_flight_map_require_missing() {
        let map = FlightMap::new();
        let err = map.require::<String>(keys::DATASET_ID).unwrap_err();
        assert_eq!(err, FlightError::MissingValue(keys::DATASET_ID.to_string()));
    }

    #[test]
    fn test_flight_map_type_mismatch_is_serialization_error() {
        let map = FlightMap::new().with(keys::ROW_COUNT, "many");
        let err = map.get::<u64>(keys::ROW_COUNT).unwrap_err();
        assert!(matches!(err, FlightError::Serialization(_)));
    }

    #[test]
    fn test_working_map_shared_reference_writes() {
        let map = WorkingMap::new();
        map.put("a", &1_u32).unwrap();
        map.put("a", &2_u32).unwrap();

        assert_eq!(map.get::<u32>("a").unwrap(), Some(2));
        assert_eq!(map.len(), 1);
        assert!(map.remove("a").is_some());
        assert!(map.is_empty());
    }

    #[test]
    fn test_working_map_clone_is_deep() {
        let map = WorkingMap::new();
        map.put("a", &1_u32).unwrap();
        let copy = map.clone();
        map.put("a", &5_u32).unwrap();

        assert_eq!(copy.get::<u32>("a").unwrap(), Some(1));
    }

    #[test]
    fn test_context_defaults() {
        let ctx = FlightContext::new("dataset.create", FlightMap::new());
        assert_eq!(ctx.flight_type(), "dataset.create");
        assert_eq!(ctx.step_index(), 0);
        assert_eq!(ctx.direction(), Direction::Do);
        assert!(ctx.result().is_none());
        assert!(ctx.description().is_none());
    }

    #[test]
    fn test_context_resolve_prefers_working_map() {
        let inputs = FlightMap::new().with(keys::NAME, "from-input");
        let ctx = FlightContext::new("t", inputs);
        assert_eq!(ctx.resolve::<String>(keys::NAME).unwrap(), "from-input");

        ctx.working_map().put(keys::NAME, "from-step").unwrap();
        assert_eq!(ctx.resolve::<String>(keys::NAME).unwrap(), "from-step");
    }

    #[test]
    fn test_context_restore_progress() {
        let persisted = FlightMap::new().with("k", 7);
        let ctx = FlightContext::new("t", FlightMap::new())
            .with_flight_id(FlightId::new("f1"))
            .with_working_map(persisted)
            .with_progress(3, Direction::Undo);

        assert_eq!(ctx.flight_id().as_str(), "f1");
        assert_eq!(ctx.step_index(), 3);
        assert_eq!(ctx.direction(), Direction::Undo);
        assert_eq!(ctx.working_map().get::<i32>("k").unwrap(), Some(7));
    }
}
