use std::{
    io::{self, BufRead},
    path::PathBuf,
};

use clap::Parser;
use eyre::{bail, eyre, Result};
use tracing::info;
use verifiable_functions::{
    artifacts::{ArtifactLocation, SRS_FILE, VERIFIER_CONTRACT_FILE, VERIFYING_KEY_JSON_FILE},
    builtin::{AddU64, EchoBytes32, MerkleRoot4},
    config::{FunctionKind, ProvingSystemKind},
    function::{Circuit, CircuitFunction},
    groth16::Groth16Backend,
    spartan::{load_srs, save_srs, SpartanBackend},
    system::{CircuitBuild, FunctionProof, ProvingSystem},
};

/// Compile, prove, verify and export verifiers for circuit functions.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    action: Action,

    /// Proving backend
    #[arg(long, value_enum, default_value_t = ProvingSystemKind::Groth16)]
    system: ProvingSystemKind,

    /// Built-in circuit function
    #[arg(long, value_enum, default_value_t = FunctionKind::AddU64)]
    function: FunctionKind,

    /// Directory holding the build artifacts
    #[arg(long, default_value = "build")]
    data: PathBuf,

    /// Directory for proof outputs; read from stdin when absent
    #[arg(long)]
    circuit: Option<PathBuf>,

    /// Function input as hex, for --prove
    #[arg(long)]
    input: Option<String>,
}

#[derive(clap::Args, Debug)]
#[group(required = true, multiple = false)]
struct Action {
    /// Compile the circuit and run setup
    #[arg(long)]
    compile: bool,

    /// Prove one execution of the function
    #[arg(long)]
    prove: bool,

    /// Verify a proof written by --prove
    #[arg(long)]
    verify: bool,

    /// Export the Solidity verifier
    #[arg(long)]
    export: bool,
}

fn circuit_location(args: &Args) -> Result<ArtifactLocation> {
    if let Some(dir) = &args.circuit {
        return Ok(ArtifactLocation::new(dir));
    }
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let dir = line.trim();
    if dir.is_empty() {
        bail!("no --circuit given and nothing on stdin");
    }
    Ok(ArtifactLocation::new(dir))
}

/// Runs the requested action. Returns the build when one was compiled or imported
/// for export, so callers can write backend-specific extras.
fn run<S, C>(system: &S, args: &Args, circuit: C) -> Result<Option<CircuitBuild<S>>>
where
    S: ProvingSystem,
    C: Circuit<S::Field>,
{
    let data = ArtifactLocation::new(&args.data);
    let mut function = CircuitFunction::<S::Field, C>::new(circuit);

    if args.action.compile {
        let build = function.build(system)?;
        build.export(system, &data)?;
        info!(
            system = %S::KIND,
            function = %args.function,
            dir = %data.dir().display(),
            "compiled"
        );
        return Ok(Some(build));
    }

    let build = CircuitBuild::import(system, &data)?;
    if args.action.prove {
        let input = args
            .input
            .as_deref()
            .ok_or_else(|| eyre!("--prove needs --input"))?;
        let input = hex::decode(input.strip_prefix("0x").unwrap_or(input))?;
        let location = circuit_location(args)?;
        let proof = function.prove(system, &build, &input)?;
        proof.export(system, &location)?;
        info!(output = %hex::encode(&proof.output), "wrote proof");
        Ok(None)
    } else if args.action.verify {
        let location = circuit_location(args)?;
        let proof = FunctionProof::<S>::import(system, &location)?;
        if !proof.verify(system, &build)? {
            bail!("proof in {} does not verify", location.dir().display());
        }
        info!("proof is valid");
        Ok(None)
    } else {
        data.write_with(VERIFIER_CONTRACT_FILE, |w| build.export_verifier(system, w))?;
        info!(path = %data.path(VERIFIER_CONTRACT_FILE).display(), "exported verifier");
        Ok(Some(build))
    }
}

fn dispatch<S: ProvingSystem>(system: &S, args: &Args) -> Result<Option<CircuitBuild<S>>> {
    match args.function {
        FunctionKind::AddU64 => run(system, args, AddU64),
        FunctionKind::EchoBytes32 => run(system, args, EchoBytes32),
        FunctionKind::MerkleRoot4 => run(system, args, MerkleRoot4),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let data = ArtifactLocation::new(&args.data);

    match args.system {
        ProvingSystemKind::Groth16 => {
            let system = Groth16Backend;
            if let Some(build) = dispatch(&system, &args)? {
                if args.action.export {
                    data.write_json(
                        VERIFYING_KEY_JSON_FILE,
                        &system.verifying_key_json(build.verifying_key()),
                    )?;
                }
            }
        }
        ProvingSystemKind::Spartan => {
            let system = match data.exists(SRS_FILE) {
                true => SpartanBackend::with_srs(load_srs(&data)?),
                false => SpartanBackend::new(),
            };
            if let Some(build) = dispatch(&system, &args)? {
                if args.action.compile && system.srs().is_none() {
                    save_srs(&data, &build.proving_key().params())?;
                    info!("saved universal parameters");
                }
            }
        }
    }
    Ok(())
}
