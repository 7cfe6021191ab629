use std::fmt::Write;

use crate::{
    error::{Error, Result},
    groth16::VerifyingKeyJson,
    scalar::{COMMITMENT_BITS, COMMITMENT_LOW_BITS},
};

const PRAGMA: &str = "// SPDX-License-Identifier: MIT\npragma solidity ^0.8.16;\n";

const PAIRING_LIBRARY: &str = r#"
library Pairing {
    uint256 constant PRIME_Q =
        21888242871839275222246405745257275088696311157297823662689037894645226208583;

    struct G1Point {
        uint256 X;
        uint256 Y;
    }

    // Fp2 elements are encoded as [c1, c0].
    struct G2Point {
        uint256[2] X;
        uint256[2] Y;
    }

    function negate(G1Point memory p) internal pure returns (G1Point memory) {
        if (p.X == 0 && p.Y == 0) {
            return G1Point(0, 0);
        }
        return G1Point(p.X, PRIME_Q - (p.Y % PRIME_Q));
    }

    function plus(G1Point memory p1, G1Point memory p2) internal view returns (G1Point memory r) {
        uint256[4] memory input = [p1.X, p1.Y, p2.X, p2.Y];
        bool success;
        assembly {
            success := staticcall(sub(gas(), 2000), 6, input, 0x80, r, 0x40)
        }
        require(success, "pairing-add-failed");
    }

    function scalarMul(G1Point memory p, uint256 s) internal view returns (G1Point memory r) {
        uint256[3] memory input = [p.X, p.Y, s];
        bool success;
        assembly {
            success := staticcall(sub(gas(), 2000), 7, input, 0x60, r, 0x40)
        }
        require(success, "pairing-mul-failed");
    }

    function pairing(
        G1Point memory a1,
        G2Point memory a2,
        G1Point memory b1,
        G2Point memory b2,
        G1Point memory c1,
        G2Point memory c2,
        G1Point memory d1,
        G2Point memory d2
    ) internal view returns (bool) {
        G1Point[4] memory p1 = [a1, b1, c1, d1];
        G2Point[4] memory p2 = [a2, b2, c2, d2];
        uint256[24] memory input;
        for (uint256 i = 0; i < 4; i++) {
            uint256 j = i * 6;
            input[j + 0] = p1[i].X;
            input[j + 1] = p1[i].Y;
            input[j + 2] = p2[i].X[0];
            input[j + 3] = p2[i].X[1];
            input[j + 4] = p2[i].Y[0];
            input[j + 5] = p2[i].Y[1];
        }
        uint256[1] memory out;
        bool success;
        assembly {
            success := staticcall(sub(gas(), 2000), 8, input, mul(24, 0x20), out, 0x20)
        }
        require(success, "pairing-opcode-failed");
        return out[0] != 0;
    }
}
"#;

const VERIFY_PROOF: &str = r#"
    function verifyProof(
        uint256[2] memory a,
        uint256[2][2] memory b,
        uint256[2] memory c,
        uint256[NUM_INPUTS] memory input
    ) public view returns (bool) {
        VerifyingKey memory vk = verifyingKey();
        require(input.length + 1 == vk.IC.length, "verifier-bad-input");
        Pairing.G1Point memory vk_x = Pairing.G1Point(0, 0);
        for (uint256 i = 0; i < input.length; i++) {
            require(input[i] < SNARK_SCALAR_FIELD, "verifier-gte-snark-scalar-field");
            vk_x = Pairing.plus(vk_x, Pairing.scalarMul(vk.IC[i + 1], input[i]));
        }
        vk_x = Pairing.plus(vk_x, vk.IC[0]);
        return Pairing.pairing(
            Pairing.negate(Pairing.G1Point(a[0], a[1])),
            Pairing.G2Point([b[0][0], b[0][1]], [b[1][0], b[1][1]]),
            vk.alfa1,
            vk.beta2,
            vk_x,
            vk.gamma2,
            Pairing.G1Point(c[0], c[1]),
            vk.delta2
        );
    }
}
"#;

const FUNCTION_VERIFIER: &str = r#"
interface IFunctionVerifier {
    function verify(PARAMS, bytes memory _proof) external view returns (bool);

    function verificationKeyHash() external pure returns (bytes32);
}

contract FunctionVerifier is IFunctionVerifier, Verifier {
    function verify(PARAMS, bytes memory _proof) external view returns (bool) {
        (uint256[2] memory a, uint256[2][2] memory b, uint256[2] memory c) =
            abi.decode(_proof, (uint256[2], uint256[2][2], uint256[2]));

        uint256[NUM_INPUTS] memory input = [ARGS];
MASKS
        return verifyProof(a, b, c, input);
    }

    function verificationKeyHash() external pure returns (bytes32) {
        return keccak256(abi.encode(verifyingKey()));
    }
}
"#;

const UNIVERSAL_ADAPTER: &str = r#"
interface IFunctionVerifier {
    function verify(PARAMS, bytes memory _proof) external view returns (bool);

    function verificationKeyHash() external pure returns (bytes32);
}

interface IUniversalVerifier {
    function verify(bytes32 _vkHash, uint256[] calldata _publicInputs, bytes calldata _proof)
        external
        view
        returns (bool);
}

contract FunctionVerifier is IFunctionVerifier {
    bytes32 public constant VK_HASH = VK_HASH_VALUE;

    IUniversalVerifier public immutable universalVerifier;

    constructor(address _universalVerifier) {
        universalVerifier = IUniversalVerifier(_universalVerifier);
    }

    function verify(PARAMS, bytes memory _proof) external view returns (bool) {
        uint256[] memory input = new uint256[](NUM_INPUTS);
INPUTS
        return universalVerifier.verify(VK_HASH, input, _proof);
    }

    function verificationKeyHash() external pure returns (bytes32) {
        return VK_HASH;
    }
}
"#;

fn fmt_error(e: std::fmt::Error) -> Error {
    Error::Serialization(e.to_string())
}

const VERIFIER_DIGEST: &str = "_verifierDigest";
const FUNCTION_ARGUMENTS: &[&str] = &["_inputHash", "_outputHash"];
const RECURSIVE_ARGUMENTS: &[&str] = &[VERIFIER_DIGEST, "_inputHash", "_outputHash"];

/// Argument names of `verify` for `num_public` signals of which each hash commitment
/// takes `limbs` elements.
fn verify_arguments(num_public: usize, limbs: usize) -> Result<&'static [&'static str]> {
    match num_public {
        n if n == 2 * limbs => Ok(FUNCTION_ARGUMENTS),
        n if n == 2 * limbs + 1 => Ok(RECURSIVE_ARGUMENTS),
        n => Err(Error::length("verifier public inputs", 2 * limbs, n)),
    }
}

fn mask(bits: usize) -> String {
    format!("((1 << {bits}) - 1)")
}

fn params(args: &[&str]) -> String {
    args.iter()
        .map(|a| format!("bytes32 {a}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Fills `input` element by element. Commitments spanning two elements are masked
/// and split into their high and low halves.
fn input_assignments(args: &[&str], limbs: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for arg in args {
        let i = lines.len();
        if limbs == 1 || *arg == VERIFIER_DIGEST {
            lines.push(format!(
                "        input[{i}] = uint256({arg}) & {};",
                mask(COMMITMENT_BITS)
            ));
        } else {
            lines.push(format!(
                "        input[{i}] = (uint256({arg}) & {}) >> {COMMITMENT_LOW_BITS};",
                mask(COMMITMENT_BITS)
            ));
            lines.push(format!(
                "        input[{}] = uint256({arg}) & {};",
                i + 1,
                mask(COMMITMENT_LOW_BITS)
            ));
        }
    }
    lines
}

fn render_function_verifier(num_public: usize) -> Result<String> {
    let args = verify_arguments(num_public, 1)?;
    let casts = args
        .iter()
        .map(|a| format!("uint256({a})"))
        .collect::<Vec<_>>()
        .join(", ");
    let masks = (0..num_public)
        .map(|i| format!("        input[{i}] = input[{i}] & {};", mask(COMMITMENT_BITS)))
        .collect::<Vec<_>>()
        .join("\n");
    Ok(FUNCTION_VERIFIER
        .replace("PARAMS", &params(args))
        .replace("NUM_INPUTS", &num_public.to_string())
        .replace("ARGS", &casts)
        .replace("MASKS", &masks))
}

fn g1(p: &[String; 2]) -> String {
    format!("Pairing.G1Point(uint256({}), uint256({}))", p[0], p[1])
}

fn g2(p: &[[String; 2]; 2]) -> String {
    format!(
        "Pairing.G2Point([uint256({}), uint256({})], [uint256({}), uint256({})])",
        p[0][0], p[0][1], p[1][0], p[1][1]
    )
}

/// A Groth16 BN254 verifier with the verifying key inlined, plus the
/// `FunctionVerifier` adapter.
pub fn groth16_verifier(vk: &VerifyingKeyJson, num_public: usize) -> Result<String> {
    if vk.ic.len() != num_public + 1 {
        return Err(Error::length("verifying key IC points", num_public + 1, vk.ic.len()));
    }
    let adapter = render_function_verifier(num_public)?;

    let mut out = String::from(PRAGMA);
    out.push_str(PAIRING_LIBRARY);
    writeln!(out, "\ncontract Verifier {{").map_err(fmt_error)?;
    writeln!(
        out,
        "    uint256 constant SNARK_SCALAR_FIELD =\n        \
         21888242871839275222246405745257275088548364400416034343698204186575808495617;\n"
    )
    .map_err(fmt_error)?;
    writeln!(
        out,
        "    struct VerifyingKey {{\n        Pairing.G1Point alfa1;\n        \
         Pairing.G2Point beta2;\n        Pairing.G2Point gamma2;\n        \
         Pairing.G2Point delta2;\n        Pairing.G1Point[] IC;\n    }}\n"
    )
    .map_err(fmt_error)?;
    writeln!(
        out,
        "    function verifyingKey() internal pure returns (VerifyingKey memory vk) {{"
    )
    .map_err(fmt_error)?;
    writeln!(out, "        vk.alfa1 = {};", g1(&vk.alpha)).map_err(fmt_error)?;
    writeln!(out, "        vk.beta2 = {};", g2(&vk.beta)).map_err(fmt_error)?;
    writeln!(out, "        vk.gamma2 = {};", g2(&vk.gamma)).map_err(fmt_error)?;
    writeln!(out, "        vk.delta2 = {};", g2(&vk.delta)).map_err(fmt_error)?;
    writeln!(out, "        vk.IC = new Pairing.G1Point[]({});", vk.ic.len()).map_err(fmt_error)?;
    for (i, p) in vk.ic.iter().enumerate() {
        writeln!(out, "        vk.IC[{i}] = {};", g1(p)).map_err(fmt_error)?;
    }
    writeln!(out, "    }}").map_err(fmt_error)?;
    out.push_str(&VERIFY_PROOF.replace("NUM_INPUTS", &num_public.to_string()));
    out.push_str(&adapter);
    Ok(out)
}

/// A `FunctionVerifier` that forwards to a deployed universal verifier, pinned to
/// one verifying key by its SHA-256. `limbs` is the number of field elements per
/// hash commitment.
pub fn universal_adapter(vk_hash: [u8; 32], num_public: usize, limbs: usize) -> Result<String> {
    let args = verify_arguments(num_public, limbs)?;
    let adapter = UNIVERSAL_ADAPTER
        .replace("PARAMS", &params(args))
        .replace("NUM_INPUTS", &num_public.to_string())
        .replace("INPUTS", &input_assignments(args, limbs).join("\n"))
        .replace("VK_HASH_VALUE", &format!("0x{}", hex::encode(vk_hash)));
    Ok(format!("{PRAGMA}{adapter}"))
}
