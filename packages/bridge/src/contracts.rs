//! Contract bindings for the OFT adapter and the bridged ERC20

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;

use crate::amounts::address_to_bytes32;

sol! {
    #![sol(all_derives)]

    /// OFT / OFT adapter surface used by the bridge
    #[sol(rpc)]
    contract OFTAdapter {
        /// LayerZero OFT send parameters
        #[sol(all_derives)]
        struct SendParam {
            uint32 dstEid;
            bytes32 to;
            uint256 amountLD;
            uint256 minAmountLD;
            bytes extraOptions;
            bytes composeMsg;
            bytes oftCmd;
        }

        /// Fee charged by the LayerZero endpoint for one message
        #[sol(all_derives)]
        struct MessagingFee {
            uint256 nativeFee;
            uint256 lzTokenFee;
        }

        function quoteSend(SendParam calldata _sendParam, bool _payInLzToken) external view returns (MessagingFee memory fee);

        function send(SendParam calldata _sendParam, MessagingFee calldata _fee, address _refundAddress) external payable;

        /// True when the OFT pulls tokens via `transferFrom` (adapters)
        function approvalRequired() external view returns (bool);
    }

    #[sol(rpc)]
    contract ERC20 {
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

pub use OFTAdapter::{MessagingFee, SendParam};

impl SendParam {
    /// Send parameters with empty options, compose message and OFT command
    pub fn new(dst_eid: u32, recipient: Address, amount_ld: U256, min_amount_ld: U256) -> Self {
        Self {
            dstEid: dst_eid,
            to: address_to_bytes32(recipient),
            amountLD: amount_ld,
            minAmountLD: min_amount_ld,
            extraOptions: Bytes::new(),
            composeMsg: Bytes::new(),
            oftCmd: Bytes::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use alloy::sol_types::SolCall;

    #[test]
    fn test_send_param_defaults() {
        let recipient = address!("d8dA6BF26964aF9D7eEd9e03E53415D37aA96045");
        let param = SendParam::new(30184, recipient, U256::from(100u64), U256::from(95u64));
        assert_eq!(param.dstEid, 30184);
        assert_eq!(&param.to[12..], recipient.as_slice());
        assert!(param.extraOptions.is_empty());
        assert!(param.composeMsg.is_empty());
        assert!(param.oftCmd.is_empty());
    }

    #[test]
    fn test_erc20_selectors() {
        assert_eq!(ERC20::approveCall::SELECTOR, [0x09, 0x5e, 0xa7, 0xb3]);
        assert_eq!(ERC20::balanceOfCall::SELECTOR, [0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(ERC20::allowanceCall::SELECTOR, [0xdd, 0x62, 0xed, 0x3e]);
    }
}
