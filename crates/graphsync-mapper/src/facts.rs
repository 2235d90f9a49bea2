//! Orienting association fields into relationship facts.

use graphsync_core::{
    Direction, EntityRef, LiveRelationship, MappingError, NodeKey, ObjectGraph, RelationshipField,
    Result, SchemaRegistry,
};

/// The relationship expressed by `owner` holding `other` in `field`.
pub(crate) fn orient(
    field: &RelationshipField,
    owner: NodeKey,
    owner_type: &str,
    other: NodeKey,
) -> LiveRelationship {
    match field.direction {
        Direction::Outgoing => LiveRelationship {
            start: owner,
            rel_type: field.rel_type.clone(),
            end: other,
            start_type: owner_type.to_string(),
            end_type: field.target_type.clone(),
        },
        Direction::Incoming => LiveRelationship {
            start: other,
            rel_type: field.rel_type.clone(),
            end: owner,
            start_type: field.target_type.clone(),
            end_type: owner_type.to_string(),
        },
    }
}

/// Resolve a field target to its endpoint key.
///
/// Fails when the reference dangles, when the target's type is not
/// registered, or when that type neither is nor carries the label of the
/// field's declared target type.
pub(crate) fn resolve_target(
    registry: &SchemaRegistry,
    graph: &ObjectGraph,
    field: &RelationshipField,
    target: EntityRef,
) -> Result<NodeKey> {
    let entity = graph
        .get(target)
        .ok_or(MappingError::UnknownEntity(target))?;
    let descriptor = registry.resolve(&entity.type_name)?;

    if !descriptor.satisfies(&field.target_type) {
        return Err(MappingError::TargetMismatch {
            field: field.field.clone(),
            expected: field.target_type.clone(),
            found: entity.type_name.clone(),
        });
    }

    Ok(match entity.id {
        Some(id) => NodeKey::Persisted(id),
        None => NodeKey::Transient(target),
    })
}

/// Every relationship `entity` currently expresses through its declared
/// fields. Targets that fail to resolve are skipped.
pub(crate) fn expressed(
    registry: &SchemaRegistry,
    graph: &ObjectGraph,
    entity: EntityRef,
) -> Result<Vec<LiveRelationship>> {
    let owner = graph
        .get(entity)
        .ok_or(MappingError::UnknownEntity(entity))?;
    let descriptor = registry.resolve(&owner.type_name)?;
    let key = match owner.id {
        Some(id) => NodeKey::Persisted(id),
        None => NodeKey::Transient(entity),
    };

    let mut relationships = Vec::new();
    for field in &descriptor.relationships {
        for &target in owner.targets(&field.field) {
            if let Ok(other) = resolve_target(registry, graph, field, target) {
                relationships.push(orient(field, key, &owner.type_name, other));
            }
        }
    }
    Ok(relationships)
}
