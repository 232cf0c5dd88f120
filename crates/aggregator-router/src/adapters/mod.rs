//! Protocol fill modules.
//!
//! Every routed marketplace has a fill module deployed behind the router and
//! one [`ProtocolAdapter`] here that turns listing details into the module
//! call. Adapters are stateless; the only state they read is the listing
//! itself, so sparse payloads are completed from the listing rather than
//! rejected.

use alloy_sol_types::sol;
use serde::de::DeserializeOwned;

use aggregator_types::{ExecutionInfo, Fee, ListingDetail, OrderKind};
use alloy_primitives::{Address, U256};

use crate::RouterError;

pub mod cryptopunks;
pub mod element;
pub mod looksrare;
pub mod payment_processor;
pub mod pools;
pub mod rarible;
pub mod seaport;
pub mod zeroex_v4;
pub mod zora;

sol! {
	/// Delivery and refund instructions shared by every fill module.
	struct NativeFillParams {
		address fillTo;
		address refundTo;
		bool revertIfIncomplete;
		uint256 amount;
	}

	struct Erc20FillParams {
		address fillTo;
		address refundTo;
		bool revertIfIncomplete;
		address token;
		uint256 amount;
	}

	struct ModuleFee {
		address recipient;
		uint256 amount;
	}

	// Seaport and its conduit-compatible forks.
	struct OfferItem {
		uint8 itemType;
		address token;
		uint256 identifierOrCriteria;
		uint256 startAmount;
		uint256 endAmount;
	}

	struct ConsiderationItem {
		uint8 itemType;
		address token;
		uint256 identifierOrCriteria;
		uint256 startAmount;
		uint256 endAmount;
		address recipient;
	}

	struct OrderParameters {
		address offerer;
		address zone;
		OfferItem[] offer;
		ConsiderationItem[] consideration;
		uint8 orderType;
		uint256 startTime;
		uint256 endTime;
		bytes32 zoneHash;
		uint256 salt;
		bytes32 conduitKey;
		uint256 totalOriginalConsiderationItems;
	}

	struct AdvancedOrder {
		OrderParameters parameters;
		uint120 numerator;
		uint120 denominator;
		bytes signature;
		bytes extraData;
	}

	struct CriteriaResolver {
		uint256 orderIndex;
		uint8 side;
		uint256 index;
		uint256 identifier;
		bytes32[] criteriaProof;
	}

	struct FulfillmentComponent {
		uint256 orderIndex;
		uint256 itemIndex;
	}

	interface ISeaportModule {
		function acceptETHListings(
			AdvancedOrder[] orders,
			NativeFillParams params,
			ModuleFee[] fees
		) external payable;

		function acceptERC20Listings(
			AdvancedOrder[] orders,
			Erc20FillParams params,
			ModuleFee[] fees
		) external;
	}

	/// Direct exchange entrypoints, used when a fill can bypass the router
	/// entirely.
	interface ISeaportExchange {
		function fulfillAdvancedOrder(
			AdvancedOrder advancedOrder,
			CriteriaResolver[] criteriaResolvers,
			bytes32 fulfillerConduitKey,
			address recipient
		) external payable returns (bool fulfilled);

		function fulfillAvailableAdvancedOrders(
			AdvancedOrder[] advancedOrders,
			CriteriaResolver[] criteriaResolvers,
			FulfillmentComponent[][] offerFulfillments,
			FulfillmentComponent[][] considerationFulfillments,
			bytes32 fulfillerConduitKey,
			address recipient,
			uint256 maximumFulfilled
		) external payable;
	}

	// LooksRare v2.
	struct LooksRareMakerOrder {
		uint8 quoteType;
		uint256 globalNonce;
		uint256 subsetNonce;
		uint256 orderNonce;
		uint256 strategyId;
		uint8 collectionType;
		address collection;
		address currency;
		address signer;
		uint256 startTime;
		uint256 endTime;
		uint256 price;
		uint256[] itemIds;
		uint256[] amounts;
		bytes additionalParameters;
	}

	interface ILooksRareModule {
		function acceptETHListings(
			LooksRareMakerOrder[] orders,
			bytes[] signatures,
			NativeFillParams params,
			ModuleFee[] fees
		) external payable;

		function acceptERC20Listings(
			LooksRareMakerOrder[] orders,
			bytes[] signatures,
			Erc20FillParams params,
			ModuleFee[] fees
		) external;
	}

	// 0x v4.
	struct ZeroexFee {
		address recipient;
		uint256 amount;
		bytes feeData;
	}

	struct ZeroexProperty {
		address propertyValidator;
		bytes propertyData;
	}

	struct ZeroexErc721Order {
		uint8 direction;
		address maker;
		address taker;
		uint256 expiry;
		uint256 nonce;
		address erc20Token;
		uint256 erc20TokenAmount;
		ZeroexFee[] fees;
		address erc721Token;
		uint256 erc721TokenId;
		ZeroexProperty[] erc721TokenProperties;
	}

	struct ZeroexErc1155Order {
		uint8 direction;
		address maker;
		address taker;
		uint256 expiry;
		uint256 nonce;
		address erc20Token;
		uint256 erc20TokenAmount;
		ZeroexFee[] fees;
		address erc1155Token;
		uint256 erc1155TokenId;
		ZeroexProperty[] erc1155TokenProperties;
		uint128 erc1155TokenAmount;
	}

	struct ZeroexSignature {
		uint8 signatureType;
		uint8 v;
		bytes32 r;
		bytes32 s;
	}

	interface IZeroexV4Module {
		function acceptETHListingsERC721(
			ZeroexErc721Order[] orders,
			ZeroexSignature[] signatures,
			NativeFillParams params,
			ModuleFee[] fees
		) external payable;

		function acceptERC20ListingsERC721(
			ZeroexErc721Order[] orders,
			ZeroexSignature[] signatures,
			Erc20FillParams params,
			ModuleFee[] fees
		) external;

		function acceptETHListingsERC1155(
			ZeroexErc1155Order[] orders,
			ZeroexSignature[] signatures,
			uint128[] amounts,
			NativeFillParams params,
			ModuleFee[] fees
		) external payable;

		function acceptERC20ListingsERC1155(
			ZeroexErc1155Order[] orders,
			ZeroexSignature[] signatures,
			uint128[] amounts,
			Erc20FillParams params,
			ModuleFee[] fees
		) external;
	}

	// Element, a 0x v4 fork with its own order shapes.
	struct ElementFee {
		address recipient;
		uint256 amount;
		bytes feeData;
	}

	struct ElementSignature {
		uint8 signatureType;
		uint8 v;
		bytes32 r;
		bytes32 s;
	}

	struct ElementErc721Order {
		address maker;
		address taker;
		uint256 expiry;
		uint256 nonce;
		address erc20Token;
		uint256 erc20TokenAmount;
		ElementFee[] fees;
		address nft;
		uint256 nftId;
	}

	struct ElementErc1155Order {
		address maker;
		address taker;
		uint256 expiry;
		uint256 nonce;
		address erc20Token;
		uint256 erc20TokenAmount;
		ElementFee[] fees;
		address nft;
		uint256 nftId;
		uint128 nftAmount;
	}

	interface IElementModule {
		function acceptETHListingsERC721(
			ElementErc721Order[] orders,
			ElementSignature[] signatures,
			NativeFillParams params,
			ModuleFee[] fees
		) external payable;

		function acceptERC20ListingsERC721(
			ElementErc721Order[] orders,
			ElementSignature[] signatures,
			Erc20FillParams params,
			ModuleFee[] fees
		) external;

		function acceptETHListingsERC1155(
			ElementErc1155Order[] orders,
			ElementSignature[] signatures,
			uint128[] amounts,
			NativeFillParams params,
			ModuleFee[] fees
		) external payable;

		function acceptERC20ListingsERC1155(
			ElementErc1155Order[] orders,
			ElementSignature[] signatures,
			uint128[] amounts,
			Erc20FillParams params,
			ModuleFee[] fees
		) external;
	}

	// Bonding-curve pools. Both interfaces take the pool address per fill;
	// an empty id list means "any token the pool holds".
	interface ISudoswapModule {
		function buyWithETH(
			address[] pairs,
			uint256[][] nftIds,
			uint256[] amounts,
			NativeFillParams params,
			ModuleFee[] fees
		) external payable;
	}

	interface INftxModule {
		function buyWithETH(
			address[] vaults,
			uint256[][] specificIds,
			uint256[] amounts,
			NativeFillParams params,
			ModuleFee[] fees
		) external payable;
	}

	// Rarible.
	struct RaribleAssetType {
		bytes4 assetClass;
		bytes data;
	}

	struct RaribleAsset {
		RaribleAssetType assetType;
		uint256 value;
	}

	struct RaribleOrder {
		address maker;
		RaribleAsset makeAsset;
		address taker;
		RaribleAsset takeAsset;
		uint256 salt;
		uint256 start;
		uint256 end;
		bytes4 dataType;
		bytes data;
	}

	interface IRaribleModule {
		function acceptETHListings(
			RaribleOrder[] orders,
			bytes[] signatures,
			NativeFillParams params,
			ModuleFee[] fees
		) external payable;

		function acceptERC20Listings(
			RaribleOrder[] orders,
			bytes[] signatures,
			Erc20FillParams params,
			ModuleFee[] fees
		) external;
	}

	// CryptoPunks.
	interface IPunksModule {
		function buyPunks(
			uint256[] punkIndexes,
			NativeFillParams params,
			ModuleFee[] fees
		) external payable;
	}

	// Zora v3 asks.
	struct ZoraAsk {
		address collection;
		uint256 tokenId;
		address currency;
		uint256 price;
		address finder;
	}

	interface IZoraModule {
		function fillAsks(
			ZoraAsk[] asks,
			NativeFillParams params,
			ModuleFee[] fees
		) external payable;

		function fillAsksERC20(
			ZoraAsk[] asks,
			Erc20FillParams params,
			ModuleFee[] fees
		) external;
	}

	// Payment processor.
	struct PaymentProcessorOrder {
		uint8 protocol;
		address marketplace;
		address maker;
		address tokenAddress;
		uint256 tokenId;
		uint256 amount;
		address paymentCoin;
		uint256 price;
		uint256 expiration;
		uint256 nonce;
		uint256 marketplaceFeeNumerator;
		uint256 maxRoyaltyFeeNumerator;
	}

	struct PaymentProcessorSignature {
		uint8 v;
		bytes32 r;
		bytes32 s;
	}

	interface IPaymentProcessorModule {
		function acceptETHListings(
			PaymentProcessorOrder[] orders,
			PaymentProcessorSignature[] signatures,
			NativeFillParams params,
			ModuleFee[] fees
		) external payable;

		function acceptERC20Listings(
			PaymentProcessorOrder[] orders,
			PaymentProcessorSignature[] signatures,
			Erc20FillParams params,
			ModuleFee[] fees
		) external;
	}
}

/// Delivery instructions threaded into every module call.
#[derive(Debug, Clone, Copy)]
pub struct FillParams {
	/// Wallet receiving the NFTs.
	pub fill_to: Address,
	/// Wallet receiving refunds for unfilled portions.
	pub refund_to: Address,
	/// Revert the whole module call when any one fill fails.
	pub revert_if_incomplete: bool,
}

/// Builds the batched module call for one protocol family.
///
/// Listings handed to [`ProtocolAdapter::build_fill`] are pre-grouped: same
/// module, same settlement currency.
pub trait ProtocolAdapter: Send + Sync {
	/// Address-book name of the fill module serving `kind`.
	fn module_name(&self, kind: OrderKind) -> &'static str;

	/// Grouping key for bucketing. Defaults to the module name; protocols
	/// whose module exposes per-standard entrypoints split further so each
	/// bucket maps to exactly one module call.
	fn bucket_name(&self, kind: OrderKind) -> &'static str {
		self.module_name(kind)
	}

	/// Whether the module can settle in ERC-20 currencies.
	fn supports_erc20(&self) -> bool {
		false
	}

	/// Encodes one module call filling all of `listings`, with `fees` paid
	/// out on top.
	fn build_fill(
		&self,
		module: Address,
		listings: &[&ListingDetail],
		fees: &[Fee],
		params: &FillParams,
	) -> Result<ExecutionInfo, RouterError>;
}

static SEAPORT: seaport::SeaportAdapter = seaport::SeaportAdapter;
static LOOKS_RARE: looksrare::LooksRareAdapter = looksrare::LooksRareAdapter;
static ZEROEX_V4: zeroex_v4::ZeroexV4Adapter = zeroex_v4::ZeroexV4Adapter;
static ELEMENT: element::ElementAdapter = element::ElementAdapter;
static SUDOSWAP: pools::SudoswapAdapter = pools::SudoswapAdapter;
static NFTX: pools::NftxAdapter = pools::NftxAdapter;
static RARIBLE: rarible::RaribleAdapter = rarible::RaribleAdapter;
static CRYPTOPUNKS: cryptopunks::CryptopunksAdapter = cryptopunks::CryptopunksAdapter;
static ZORA: zora::ZoraAdapter = zora::ZoraAdapter;
static PAYMENT_PROCESSOR: payment_processor::PaymentProcessorAdapter =
	payment_processor::PaymentProcessorAdapter;

/// The adapter serving `kind`, or `None` for kinds that never route through
/// a fill module (dedicated, fetched-calldata and mint fills).
pub fn adapter_for(kind: OrderKind) -> Option<&'static dyn ProtocolAdapter> {
	match kind {
		OrderKind::Seaport
		| OrderKind::SeaportV14
		| OrderKind::SeaportV15
		| OrderKind::SeaportV16
		| OrderKind::Alienswap => Some(&SEAPORT),
		OrderKind::LooksRareV2 => Some(&LOOKS_RARE),
		OrderKind::ZeroexV4Erc721 | OrderKind::ZeroexV4Erc1155 => Some(&ZEROEX_V4),
		OrderKind::ElementErc721 | OrderKind::ElementErc1155 => Some(&ELEMENT),
		OrderKind::Sudoswap | OrderKind::SudoswapV2 => Some(&SUDOSWAP),
		OrderKind::Nftx | OrderKind::NftxV3 => Some(&NFTX),
		OrderKind::Rarible => Some(&RARIBLE),
		OrderKind::Cryptopunks => Some(&CRYPTOPUNKS),
		OrderKind::ZoraV3 => Some(&ZORA),
		OrderKind::PaymentProcessor => Some(&PAYMENT_PROCESSOR),
		OrderKind::Blur
		| OrderKind::BlurPartial
		| OrderKind::X2y2
		| OrderKind::Foundation
		| OrderKind::SuperRare
		| OrderKind::Manifold
		| OrderKind::Mint => None,
	}
}

/// Parses a listing's raw payload into the adapter's typed form.
///
/// A null payload parses as the type's default; adapters complete missing
/// fields from the listing itself.
pub(crate) fn parse_payload<T>(listing: &ListingDetail) -> Result<T, RouterError>
where
	T: Default + DeserializeOwned,
{
	if listing.raw_data.is_null() {
		return Ok(T::default());
	}
	serde_json::from_value(listing.raw_data.clone()).map_err(|e| RouterError::Payload {
		order_id: listing.order_id.clone(),
		message: e.to_string(),
	})
}

/// Total spend across a bucket, fees included.
pub(crate) fn bucket_total(listings: &[&ListingDetail]) -> U256 {
	listings
		.iter()
		.fold(U256::ZERO, |acc, listing| {
			acc.saturating_add(listing.total_cost())
		})
}

pub(crate) fn native_params(params: &FillParams, total: U256) -> NativeFillParams {
	NativeFillParams {
		fillTo: params.fill_to,
		refundTo: params.refund_to,
		revertIfIncomplete: params.revert_if_incomplete,
		amount: total,
	}
}

pub(crate) fn erc20_params(params: &FillParams, token: Address, total: U256) -> Erc20FillParams {
	Erc20FillParams {
		fillTo: params.fill_to,
		refundTo: params.refund_to,
		revertIfIncomplete: params.revert_if_incomplete,
		token,
		amount: total,
	}
}

pub(crate) fn module_fees(fees: &[Fee]) -> Vec<ModuleFee> {
	fees.iter()
		.map(|fee| ModuleFee {
			recipient: fee.recipient,
			amount: fee.amount,
		})
		.collect()
}

/// Rejects ERC-20 buckets for modules that only settle in native currency.
pub(crate) fn require_native(kind: OrderKind, currency: Address) -> Result<(), RouterError> {
	if aggregator_types::is_native(currency) {
		Ok(())
	} else {
		Err(RouterError::Currency { kind, currency })
	}
}
