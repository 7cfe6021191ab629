// Build, Worker, Client
//
// Function(input) -> output
// R1CS: Function(input) = output, bound to sha256(input) and sha256(output)
//
// 1. Build
// Function -> ConstraintSystem -> ConstraintMatrices
// ConstraintMatrices -> ProvingKey, VerifyingKey
//
// 2. Worker
// Build -> ConstraintMatrices, ProvingKey
// Client -> Input
// Function, Input -> Output
// ConstraintMatrices, Input, Output -> Proof
//
// 3. Client
// Build -> VerifyingKey (or the exported Solidity verifier)
// Worker -> Proof, Output
// VerifyingKey, Hash(Input), Hash(Output), Proof -> Verify
pub mod artifacts;
pub mod bits;
pub mod builtin;
pub mod circuit;
pub mod config;
pub mod error;
pub mod function;
pub mod groth16;
pub mod io;
pub mod proof;
pub mod r1cs;
pub mod recursive;
pub mod scalar;
pub mod sha;
pub mod solidity;
pub mod spartan;
pub mod ssz;
pub mod system;
pub mod vars;

pub use error::{Error, Result};
