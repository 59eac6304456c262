#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! ```
//! use cpf::k3d::{PointCloud, Se3};
//! use cpf::registration::{ProcessOutcome, Registration, RegistrationParams};
//!
//! // a flat 8x8 patch
//! let points = (0..64)
//!     .map(|i| [(i % 8) as f64 * 0.02, (i / 8) as f64 * 0.02, 0.0])
//!     .collect::<Vec<_>>();
//! let model = PointCloud::from_oriented(points, vec![[0.0, 0.0, 1.0]; 64]);
//!
//! let mut session = Registration::new();
//! session.set_params(RegistrationParams {
//!     curvature_search_radius: 0.05,
//!     ..Default::default()
//! });
//! session.add_reference_model(&model, "plane").unwrap();
//! session.update_scene(&model).unwrap();
//!
//! match session.process().unwrap() {
//!     ProcessOutcome::Refined { rms, .. } => assert!(rms.is_finite()),
//!     ProcessOutcome::NoPose => assert_eq!(session.icp_pose(), Se3::IDENTITY),
//! }
//! ```

#[doc(inline)]
pub use cpf_3d as k3d;

#[doc(inline)]
pub use cpf_icp as icp;

#[doc(inline)]
pub use cpf_matching as matching;

#[doc(inline)]
pub use cpf_registration as registration;
