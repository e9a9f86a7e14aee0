// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Sections describing services that sit beside the filesystems: the HSM copytool stack, the
//! management framework, the REST API and the storage arrays.

pub mod emf;
pub mod hsm;
pub mod rest;
pub mod sfa;

pub use emf::EmfSettings;
pub use hsm::HsmSettings;
pub use rest::RestSettings;
pub use sfa::SfaSettings;
