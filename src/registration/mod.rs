pub mod model;
pub mod policy;
pub mod service;

pub use model::{
    NewOwner, NewVehicle, Owner, Registration, RegistrationStatus, RegistrationStub,
    StatusChange, Vehicle,
};
pub use policy::{can_access, Action};
pub use service::RegistrationService;
