//! Discovery of build configurations and their steps
//!
//! One list request, then one detail request per configuration. Any failure
//! aborts discovery; a run never works from a partial catalog.

use buildkick_client::{BuildTypeDetail, BuildTypeList, CiTransport, RestPaths, decode};
use buildkick_report::{ArtifactSlot, DebugArtifacts};
use buildkick_utils::error::BuildKickError;
use buildkick_utils::types::BuildConfig;
use tracing::debug;

/// Fetch every configuration in server order.
///
/// # Errors
///
/// Returns `BuildKickError::Transport` when a request fails,
/// `BuildKickError::MalformedResponse` when a body does not decode, and
/// `BuildKickError::Artifact` when a debug snapshot cannot be written.
pub async fn fetch_all(
    transport: &dyn CiTransport,
    paths: &RestPaths,
    artifacts: &DebugArtifacts,
) -> Result<Vec<BuildConfig>, BuildKickError> {
    let address = paths.build_types();
    let list: BuildTypeList = get(transport, artifacts, ArtifactSlot::BuildTypes, &address).await?;
    debug!("Discovered {} build config ids", list.build_types.len());

    let mut configs = Vec::with_capacity(list.build_types.len());
    for id in list.ids() {
        configs.push(fetch_one(transport, paths, artifacts, id).await?);
    }
    Ok(configs)
}

async fn fetch_one(
    transport: &dyn CiTransport,
    paths: &RestPaths,
    artifacts: &DebugArtifacts,
    id: String,
) -> Result<BuildConfig, BuildKickError> {
    let address = paths.build_type(&id);
    let detail: BuildTypeDetail =
        get(transport, artifacts, ArtifactSlot::BuildType, &address).await?;
    Ok(BuildConfig::new(id, detail.into_steps()))
}

async fn get<T: serde::de::DeserializeOwned>(
    transport: &dyn CiTransport,
    artifacts: &DebugArtifacts,
    slot: ArtifactSlot,
    address: &str,
) -> Result<T, BuildKickError> {
    debug!("Address: '{address}'");
    artifacts.record_request(slot, address)?;
    let body = transport.get_json(address).await?;
    artifacts.record_result(slot, Some(&body))?;
    Ok(decode(address, &body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeTransport, paths};
    use buildkick_redaction::CredentialRedactor;
    use camino::Utf8PathBuf;

    #[tokio::test]
    async fn test_fetch_all_keeps_server_order() {
        let fake = FakeTransport::with_catalog(&[
            ("Zeta", &[("s1", "Build", "MSBuild", false)]),
            ("alpha", &[]),
            (
                "Mid",
                &[("s1", "Run", "simpleRunner", false), ("s2", "Off", "simpleRunner", true)],
            ),
        ]);

        let configs = fetch_all(&fake, &paths(), &DebugArtifacts::disabled())
            .await
            .unwrap();

        let ids: Vec<_> = configs.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["Zeta", "alpha", "Mid"]);
        assert!(configs[1].steps.is_empty());
        assert!(configs[2].steps[1].natively_disabled);
        assert!(configs.iter().all(|c| !c.do_not_run));
        assert_eq!(fake.count("GET"), 4);
    }

    #[tokio::test]
    async fn test_missing_steps_object_means_no_steps() {
        let p = paths();
        let fake = FakeTransport::new()
            .reply("GET", &p.build_types(), r#"{"buildType":[{"id":"A"}]}"#)
            .reply("GET", &p.build_type("A"), r#"{"id":"A"}"#);

        let configs = fetch_all(&fake, &p, &DebugArtifacts::disabled())
            .await
            .unwrap();
        assert_eq!(configs.len(), 1);
        assert!(configs[0].steps.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_list_aborts() {
        let p = paths();
        let fake = FakeTransport::new().reply("GET", &p.build_types(), "<html>Log in</html>");

        let err = fetch_all(&fake, &p, &DebugArtifacts::disabled())
            .await
            .unwrap_err();
        match err {
            BuildKickError::MalformedResponse(e) => assert_eq!(e.address, p.build_types()),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(fake.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_one_failing_detail_aborts_everything() {
        let p = paths();
        let fake = FakeTransport::new()
            .reply("GET", &p.build_types(), r#"{"buildType":[{"id":"A"},{"id":"B"},{"id":"C"}]}"#)
            .reply("GET", &p.build_type("A"), r#"{"id":"A"}"#)
            .fail("GET", &p.build_type("B"), 500);

        let err = fetch_all(&fake, &p, &DebugArtifacts::disabled())
            .await
            .unwrap_err();
        assert!(matches!(err, BuildKickError::Transport(_)));
        assert!(!fake.calls().iter().any(|c| c.address == p.build_type("C")));
    }

    #[tokio::test]
    async fn test_step_without_type_is_malformed() {
        let p = paths();
        let fake = FakeTransport::new()
            .reply("GET", &p.build_types(), r#"{"buildType":[{"id":"A"}]}"#)
            .reply("GET", &p.build_type("A"), r#"{"steps":{"step":[{"id":"s1","name":"n"}]}}"#);

        let err = fetch_all(&fake, &p, &DebugArtifacts::disabled())
            .await
            .unwrap_err();
        assert!(matches!(err, BuildKickError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_snapshots_first_detail_only() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = DebugArtifacts::new(
            Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap(),
            CredentialRedactor::new(),
        );
        let fake = FakeTransport::with_catalog(&[("A", &[]), ("B", &[])]);

        fetch_all(&fake, &paths(), &artifacts).await.unwrap();

        assert_eq!(
            artifacts.written_names(),
            vec![
                "build-type.result.json",
                "build-type.txt",
                "build-types.result.json",
                "build-types.txt",
            ]
        );
        let detail = std::fs::read_to_string(dir.path().join("build-type.result.json")).unwrap();
        assert!(detail.contains("\"A\""));
    }
}
