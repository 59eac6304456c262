use cpf_3d::{PointCloud, Se3};
use cpf_matching::MatchingError;
use cpf_registration::{
    ProcessOutcome, Registration, RegistrationError, RegistrationParams, SessionState,
};
use glam::DVec3;

const SPACING: f64 = 0.05;

/// Three orthogonal faces meeting at `apex`, normals pointing inward.
fn cube_corner(apex: DVec3) -> PointCloud {
    let mut points = Vec::new();
    let mut normals = Vec::new();
    let mut push = |offset: DVec3, normal: [f64; 3]| {
        points.push((apex + offset * SPACING).to_array());
        normals.push(normal);
    };

    for i in 0..6 {
        for j in 0..6 {
            push(DVec3::new(i as f64, j as f64, 0.0), [0.0, 0.0, 1.0]);
        }
    }
    for i in 0..8 {
        for k in 1..5 {
            push(DVec3::new(i as f64, 0.0, k as f64), [0.0, 1.0, 0.0]);
        }
    }
    for j in 1..9 {
        for k in 1..5 {
            push(DVec3::new(0.0, j as f64, k as f64), [1.0, 0.0, 0.0]);
        }
    }

    PointCloud::from_oriented(points, normals)
}

fn session() -> Registration {
    let mut session = Registration::new();
    let valid = session.set_params(RegistrationParams {
        angle_step: 7.0,
        curvature_search_radius: 0.12,
        cluster_trans_threshold: 0.03,
        ..Default::default()
    });
    assert!(valid);
    session
}

#[test]
fn test_process_refines_translation() -> Result<(), RegistrationError> {
    let _ = env_logger::builder().is_test(true).try_init();

    let model = cube_corner(DVec3::new(0.2, 0.1, 0.3));
    let shift = DVec3::new(0.05, 0.0, 0.0);
    let scene = model.transformed(&Se3::from_translation(shift));

    let mut session = session();
    session.set_verbose(true);
    let id = session.add_reference_model(&model, "cube_corner")?;
    assert_eq!(session.state(), SessionState::ModelLoaded { model_id: id });

    session.update_scene(&scene)?;
    assert_eq!(session.state(), SessionState::SceneReady { model_id: id });

    let outcome = session.process()?;
    let ProcessOutcome::Refined { votes, rms } = outcome else {
        panic!("no pose detected");
    };
    assert!(votes > 0);
    assert!(rms < 1e-3);
    assert_eq!(session.rms(), rms);

    let pose = session.icp_pose();
    assert!(pose.translation.distance(shift) < 1e-3);
    assert!(pose.rotation_angle_to(&Se3::IDENTITY) < 1e-3);

    let (poses, pose_votes) = session.poses();
    assert!(!poses.is_empty());
    assert_eq!(pose_votes[0], votes);
    assert!(session.num_pose_clusters() >= poses.len());
    assert_eq!(session.model_curvatures().map(|c| c.len()), Some(model.len()));
    assert_eq!(session.scene_curvatures().map(|c| c.len()), Some(scene.len()));

    // back to idle once done
    assert_eq!(session.state(), SessionState::SceneReady { model_id: id });
    assert!(!session.process_flag().is_set());

    Ok(())
}

#[test]
fn test_second_model_rejected() -> Result<(), RegistrationError> {
    let model = cube_corner(DVec3::new(0.2, 0.1, 0.3));
    let other = cube_corner(DVec3::ZERO);

    let mut session = session();
    let id = session.add_reference_model(&model, "first")?;
    assert_eq!(
        session.add_reference_model(&other, "second"),
        Err(RegistrationError::ModelAlreadyLoaded { model_id: id })
    );

    // the first model is untouched
    assert_eq!(session.matcher().num_models(), 1);
    assert_eq!(session.model_cloud(), Some(&model));
    assert_eq!(session.state(), SessionState::ModelLoaded { model_id: id });

    Ok(())
}

#[test]
fn test_process_is_single_flight() -> Result<(), RegistrationError> {
    let model = cube_corner(DVec3::new(0.2, 0.1, 0.3));

    let mut session = session();
    let id = session.add_reference_model(&model, "cube_corner")?;
    session.update_scene(&model)?;

    let flag = session.process_flag();
    let guard = flag.try_acquire();
    assert!(guard.is_some());
    assert_eq!(session.state(), SessionState::Matching { model_id: id });
    assert_eq!(session.process(), Err(RegistrationError::AlreadyProcessing));
    // the rejected call does not release someone else's flag
    assert!(flag.is_set());

    drop(guard);
    assert!(!flag.is_set());
    assert!(matches!(session.process()?, ProcessOutcome::Refined { .. }));
    assert!(!flag.is_set());

    Ok(())
}

#[test]
fn test_failed_process_clears_flag() -> Result<(), RegistrationError> {
    let model = cube_corner(DVec3::new(0.2, 0.1, 0.3));

    let mut session = session();
    session.add_reference_model(&model, "cube_corner")?;

    assert_eq!(
        session.process(),
        Err(RegistrationError::Matching(MatchingError::NoScene))
    );
    assert!(!session.process_flag().is_set());
    assert_eq!(session.icp_pose(), Se3::IDENTITY);

    Ok(())
}

#[test]
fn test_invalid_scene_rejected() -> Result<(), RegistrationError> {
    let model = cube_corner(DVec3::new(0.2, 0.1, 0.3));
    let unoriented = PointCloud::new(model.points().clone(), None, None);

    let mut session = session();
    let id = session.add_reference_model(&model, "cube_corner")?;
    assert!(session.update_scene(&unoriented).is_err());
    assert_eq!(session.scene_cloud(), None);
    assert_eq!(session.state(), SessionState::ModelLoaded { model_id: id });

    Ok(())
}

#[test]
fn test_reset() -> Result<(), RegistrationError> {
    let model = cube_corner(DVec3::new(0.2, 0.1, 0.3));
    let scene = model.transformed(&Se3::from_translation(DVec3::new(0.05, 0.0, 0.0)));

    let mut session = session();
    assert_eq!(session.reset(), Err(RegistrationError::NoModel));

    session.add_reference_model(&model, "cube_corner")?;
    session.update_scene(&scene)?;
    session.process()?;
    assert_ne!(session.icp_pose(), Se3::IDENTITY);

    session.reset()?;
    assert_eq!(session.icp_pose(), Se3::IDENTITY);
    assert_eq!(session.scene_cloud(), Some(&model));

    Ok(())
}

#[test]
fn test_params_from_json() -> Result<(), Box<dyn std::error::Error>> {
    let params: RegistrationParams = serde_json::from_str(
        r#"{ "angle_step": 7.0, "icp_num_max_iterations": 20, "icp_rejection": "Distance" }"#,
    )?;
    assert_eq!(params.angle_step, 7.0);
    assert_eq!(params.icp_num_max_iterations, 20);
    assert_eq!(params.cluster_trans_threshold, 0.03);

    let mut session = Registration::new();
    assert!(session.set_params(params.clone()));
    assert_eq!(session.params(), &params);
    assert_eq!(session.matcher().params().angle_bins(), 52);

    // out of range values are reported and clamped
    assert!(!session.set_params(RegistrationParams {
        angle_step: 0.0,
        ..Default::default()
    }));

    Ok(())
}
