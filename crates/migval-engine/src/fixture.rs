//! Populate a local target from source objects.
//!
//! Performs the migration the validator expects, so a freshly populated
//! store validates clean. Used by tests across the workspace and handy for
//! building demo repositories.

use std::io::Read;

use migval_source::{
    Content, ControlGroup, Datastream, DatastreamVersion, ObjectState, PropertyName, SourceObject,
};
use migval_target::{LocalTargetWriter, TargetResult, Triple};

use crate::comparison::migrated_versions;
use crate::config::{Strategy, ValidationConfig};

/// Migrate `object` faithfully.
pub fn migrate_object(
    writer: &LocalTargetWriter,
    object: &SourceObject,
    config: &ValidationConfig,
) -> TargetResult<()> {
    migrate_object_with(writer, object, config, |_, bytes| bytes.to_vec())
}

/// Migrate `object`, passing every version's bytes through `transform`
/// before they are stored. Digests are recorded over the transformed bytes.
pub fn migrate_object_with<F>(
    writer: &LocalTargetWriter,
    object: &SourceObject,
    config: &ValidationConfig,
    mut transform: F,
) -> TargetResult<()>
where
    F: FnMut(&Datastream, &[u8]) -> Vec<u8>,
{
    if object.info.state().is_deleted(config.inactive_as_deleted) {
        return Ok(());
    }
    let target_id = config.target_object_id(object.pid());
    let triples = [PropertyName::Label, PropertyName::State, PropertyName::Owner]
        .into_iter()
        .filter_map(|name| {
            let value = object.info.property(name)?;
            Some(Triple::new(&target_id, name.uri(), value))
        })
        .collect();
    writer.create_object(
        &target_id,
        object.info.property(PropertyName::CreatedDate),
        object.info.property(PropertyName::LastModifiedDate),
        triples,
    )?;

    for datastream in &object.datastreams {
        if datastream.state.is_deleted(config.inactive_as_deleted) {
            continue;
        }
        let versions = match config.strategy {
            Strategy::FullHistory => migrated_versions(datastream),
            Strategy::HeadOnly => {
                let start = datastream.versions.len().saturating_sub(1);
                &datastream.versions[start..]
            }
        };
        for version in versions {
            let bytes = transform(datastream, &content_bytes(&version.content)?);
            writer.add_version(
                &target_id,
                &datastream.id,
                &bytes,
                version.mime_type.as_deref(),
                &version.created,
            )?;
        }
    }
    Ok(())
}

fn content_bytes(content: &Content) -> std::io::Result<Vec<u8>> {
    match content {
        // external content is migrated as its reference
        Content::Url { url } => Ok(url.clone().into_bytes()),
        _ => {
            let mut bytes = Vec::new();
            content.open()?.read_to_end(&mut bytes)?;
            Ok(bytes)
        }
    }
}

/// A representative object: five mapped properties and one unmapped, an
/// inline `DC` datastream, and `managed` managed datastreams `MASTER1..`
/// with two versions each.
pub fn sample_object(pid: &str, managed: usize) -> SourceObject {
    let mut object = SourceObject::new(pid)
        .with_property(PropertyName::Label, format!("Sample {pid}"))
        .with_property(PropertyName::State, "A")
        .with_property(PropertyName::Owner, "fedoraAdmin")
        .with_property(PropertyName::CreatedDate, "2019-06-01T10:00:00.000Z")
        .with_property(PropertyName::LastModifiedDate, "2020-03-04T05:06:07Z");
    object.info.properties.push(migval_source::ObjectProperty::new(
        "info:fedora/fedora-system:def/model#hasModel",
        "info:fedora/demo:Model",
    ));
    object = object.with_datastream(Datastream {
        id: "DC".into(),
        control_group: ControlGroup::InlineXml,
        state: ObjectState::Active,
        versionable: true,
        versions: vec![DatastreamVersion {
            id: "DC.0".into(),
            label: Some("Dublin Core".into()),
            mime_type: Some("text/xml".into()),
            created: "2019-06-01T10:00:00Z".into(),
            content: Content::Inline {
                text: format!("<oai_dc:dc><dc:identifier>{pid}</dc:identifier></oai_dc:dc>"),
            },
        }],
    });
    for i in 1..=managed {
        let id = format!("MASTER{i}");
        let versions = (0..2)
            .map(|v| DatastreamVersion {
                id: format!("{id}.{v}"),
                label: None,
                mime_type: Some("application/octet-stream".into()),
                created: format!("2019-06-0{}T10:00:00Z", v + 2),
                content: Content::Inline {
                    text: format!("{pid} {id} version {v} payload"),
                },
            })
            .collect();
        object = object.with_datastream(Datastream {
            id,
            control_group: ControlGroup::Managed,
            state: ObjectState::Active,
            versionable: true,
            versions,
        });
    }
    object
}
