#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use bq27441::memory::checksum;
use bq27441::registers::{commands, control_subcommands, memory_subclass, ControlStatus, StatusFlags};
use bq27441::{Bq27441, GaugeConfig, Transport};
use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};
use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

pub const ADDR: u8 = 0x55;

/// Delay that only gives other futures on the same task a chance to run
pub struct YieldDelay;

impl embedded_hal_async::delay::DelayNs for YieldDelay {
    async fn delay_ns(&mut self, _ns: u32) {
        tokio::task::yield_now().await;
    }

    async fn delay_us(&mut self, _us: u32) {
        tokio::task::yield_now().await;
    }

    async fn delay_ms(&mut self, _ms: u32) {
        tokio::task::yield_now().await;
    }
}

/// The eh1 I2C mock is blocking, this wraps it into the async trait the driver uses.
#[derive(Clone)]
pub struct MockI2c {
    mock: Rc<RefCell<I2cMock>>,
}

impl MockI2c {
    pub fn new(transactions: &[I2cTransaction]) -> Self {
        Self {
            mock: Rc::new(RefCell::new(I2cMock::new(transactions))),
        }
    }

    /// Verifies that all expected transactions occurred
    pub fn done(self) {
        self.mock.borrow_mut().done();
    }
}

impl ErrorType for MockI2c {
    type Error = ErrorKind;
}

impl embedded_hal_async::i2c::I2c for MockI2c {
    async fn read(&mut self, address: u8, read: &mut [u8]) -> Result<(), Self::Error> {
        embedded_hal::i2c::I2c::read(&mut *self.mock.borrow_mut(), address, read)
            .map_err(|_| ErrorKind::Other)
    }

    async fn write(&mut self, address: u8, write: &[u8]) -> Result<(), Self::Error> {
        embedded_hal::i2c::I2c::write(&mut *self.mock.borrow_mut(), address, write)
            .map_err(|_| ErrorKind::Other)
    }

    async fn write_read(
        &mut self,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Self::Error> {
        embedded_hal::i2c::I2c::write_read(&mut *self.mock.borrow_mut(), address, write, read)
            .map_err(|_| ErrorKind::Other)
    }

    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        embedded_hal::i2c::I2c::transaction(&mut *self.mock.borrow_mut(), address, operations)
            .map_err(|_| ErrorKind::Other)
    }
}

pub fn mock_driver(expectations: &[I2cTransaction]) -> (Bq27441<MockI2c, YieldDelay>, MockI2c) {
    let i2c = MockI2c::new(expectations);
    (Bq27441::new(i2c.clone(), YieldDelay, ADDR), i2c)
}

/// Expected bus traffic of a control subcommand write
pub fn control_write(subcommand: u16) -> I2cTransaction {
    let [lo, hi] = subcommand.to_le_bytes();
    I2cTransaction::write(ADDR, vec![commands::CONTROL, lo, hi])
}

/// Expected bus traffic of a 16-bit register read
pub fn word_read(register: u8, value: u16) -> I2cTransaction {
    I2cTransaction::write_read(ADDR, vec![register], value.to_le_bytes().to_vec())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimError;

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Write { register: u8, data: Vec<u8> },
    Read { register: u8, len: usize },
}

const SUBCLASS_SIZE: usize = 64;

/// A software model of the gauge: standard registers, control subcommands,
/// seal state, config update mode and a checksum-guarded data flash.
pub struct SimState {
    pub words: HashMap<u8, u16>,
    pub flags: u16,
    pub control_status: u16,
    pub device_type: u16,
    pub flash: HashMap<u8, [u8; SUBCLASS_SIZE]>,
    pub log: Vec<Op>,
    pub subcommands: Vec<u16>,

    /// SET_CFGUPDATE is acknowledged but CFGUPMODE never shows up
    pub ignore_config_entry: bool,
    /// Exit subcommands are acknowledged but CFGUPMODE never clears
    pub ignore_config_exit: bool,
    /// Any write to this register fails on the bus
    pub fail_writes_to: Option<u8>,
    /// Checksum register does not match the selected block
    pub corrupt_block_select: bool,
    /// Valid checksums are accepted but the block is never committed
    pub drop_commits: bool,

    class: u8,
    block: u8,
    buffer: [u8; 32],
    checksum_reg: u8,
    control_result: u16,
    unseal_armed: bool,
}

impl SimState {
    fn in_config(&self) -> bool {
        self.flags & StatusFlags::CFGUPMODE.bits() != 0
    }

    fn sealed(&self) -> bool {
        self.control_status & ControlStatus::SS.bits() != 0
    }

    fn select_block(&mut self) {
        let start = self.block as usize * 32;
        let subclass = self.flash.entry(self.class).or_insert([0; SUBCLASS_SIZE]);

        self.buffer.copy_from_slice(&subclass[start..start + 32]);
        self.checksum_reg = checksum(&self.buffer);

        if self.corrupt_block_select {
            self.checksum_reg ^= 0x5A;
        }
    }

    fn commit_block(&mut self) {
        let start = self.block as usize * 32;
        let buffer = self.buffer;
        let subclass = self.flash.entry(self.class).or_insert([0; SUBCLASS_SIZE]);

        subclass[start..start + 32].copy_from_slice(&buffer);
    }

    fn control(&mut self, subcommand: u16) {
        self.subcommands.push(subcommand);

        if subcommand != control_subcommands::UNSEAL_KEY {
            self.unseal_armed = false;
        }

        match subcommand {
            control_subcommands::CONTROL_STATUS => self.control_result = self.control_status,
            control_subcommands::DEVICE_TYPE => self.control_result = self.device_type,
            control_subcommands::FW_VERSION => self.control_result = 0x0109,
            control_subcommands::SET_CFGUPDATE => {
                if !self.sealed() && !self.ignore_config_entry {
                    self.flags |= StatusFlags::CFGUPMODE.bits();
                }
            }
            control_subcommands::EXIT_CFGUPDATE
            | control_subcommands::EXIT_RESIM
            | control_subcommands::SOFT_RESET => {
                if !self.ignore_config_exit {
                    self.flags &= !StatusFlags::CFGUPMODE.bits();
                }
            }
            control_subcommands::SEALED => self.control_status |= ControlStatus::SS.bits(),
            control_subcommands::UNSEAL_KEY => {
                if self.unseal_armed {
                    self.control_status &= !ControlStatus::SS.bits();
                    self.unseal_armed = false;
                } else {
                    self.unseal_armed = true;
                }
            }
            _ => {}
        }
    }

    fn write(&mut self, register: u8, data: &[u8]) -> Result<(), SimError> {
        self.log.push(Op::Write {
            register,
            data: data.to_vec(),
        });

        if self.fail_writes_to == Some(register) {
            return Err(SimError);
        }

        match register {
            commands::CONTROL => self.control(u16::from_le_bytes([data[0], data[1]])),
            commands::DATA_CLASS => {
                self.class = data[0];
                self.block = 0;
                self.select_block();
            }
            commands::DATA_BLOCK => {
                self.block = data[0];
                self.select_block();
            }
            commands::BLOCK_DATA..=0x5F => {
                let start = (register - commands::BLOCK_DATA) as usize;
                self.buffer[start..start + data.len()].copy_from_slice(data);
            }
            commands::BLOCK_DATA_CHECKSUM => {
                self.checksum_reg = data[0];

                if self.in_config() && data[0] == checksum(&self.buffer) && !self.drop_commits {
                    self.commit_block();
                }
            }
            _ => {}
        }

        Ok(())
    }

    fn read(&mut self, register: u8, data: &mut [u8]) -> Result<(), SimError> {
        self.log.push(Op::Read {
            register,
            len: data.len(),
        });

        match register {
            commands::BLOCK_DATA..=0x5F => {
                let start = (register - commands::BLOCK_DATA) as usize;
                data.copy_from_slice(&self.buffer[start..start + data.len()]);
            }
            commands::BLOCK_DATA_CHECKSUM => data[0] = self.checksum_reg,
            _ => {
                let word = match register {
                    commands::CONTROL => self.control_result,
                    commands::FLAGS => self.flags,
                    commands::OP_CONFIG => {
                        let registers = self.flash_bytes(memory_subclass::REGISTERS, 0, 2);
                        u16::from_be_bytes([registers[0], registers[1]])
                    }
                    other => self.words.get(&other).copied().unwrap_or(0),
                };

                let bytes = word.to_le_bytes();
                let len = data.len().min(2);
                data[..len].copy_from_slice(&bytes[..len]);
            }
        }

        Ok(())
    }

    pub fn flash_bytes(&self, class: u8, offset: usize, len: usize) -> Vec<u8> {
        match self.flash.get(&class) {
            Some(subclass) => subclass[offset..offset + len].to_vec(),
            None => vec![0; len],
        }
    }
}

#[derive(Clone)]
pub struct SimGauge {
    pub state: Rc<RefCell<SimState>>,
}

impl SimGauge {
    pub fn new() -> Self {
        let mut flash = HashMap::new();

        let mut state = [0u8; SUBCLASS_SIZE];
        for (i, byte) in state.iter_mut().enumerate() {
            *byte = (i as u8).wrapping_mul(7).wrapping_add(3);
        }
        flash.insert(memory_subclass::STATE, state);

        let mut power = [0u8; SUBCLASS_SIZE];
        power[7..9].copy_from_slice(&[0x00, 0x08]);
        flash.insert(memory_subclass::POWER, power);

        let mut discharge = [0u8; SUBCLASS_SIZE];
        discharge[..4].copy_from_slice(&[15, 10, 5, 2]);
        flash.insert(memory_subclass::DISCHARGE, discharge);

        let mut registers = [0u8; SUBCLASS_SIZE];
        registers[..2].copy_from_slice(&[0x25, 0xF8]);
        flash.insert(memory_subclass::REGISTERS, registers);

        Self {
            state: Rc::new(RefCell::new(SimState {
                words: HashMap::new(),
                flags: 0,
                control_status: 0,
                device_type: 0x0421,
                flash,
                log: Vec::new(),
                subcommands: Vec::new(),
                ignore_config_entry: false,
                ignore_config_exit: false,
                fail_writes_to: None,
                corrupt_block_select: false,
                drop_commits: false,
                class: 0,
                block: 0,
                buffer: [0; 32],
                checksum_reg: 0xFF,
                control_result: 0,
                unseal_armed: false,
            })),
        }
    }

    pub fn sealed() -> Self {
        let sim = Self::new();
        sim.state.borrow_mut().control_status |= ControlStatus::SS.bits();
        sim
    }

    pub fn log(&self) -> Vec<Op> {
        self.state.borrow().log.clone()
    }

    pub fn clear_log(&self) {
        let mut state = self.state.borrow_mut();
        state.log.clear();
        state.subcommands.clear();
    }

    pub fn subcommands(&self) -> Vec<u16> {
        self.state.borrow().subcommands.clone()
    }

    pub fn flash_bytes(&self, class: u8, offset: usize, len: usize) -> Vec<u8> {
        self.state.borrow().flash_bytes(class, offset, len)
    }

    pub fn in_config(&self) -> bool {
        self.state.borrow().in_config()
    }

    pub fn is_sealed(&self) -> bool {
        self.state.borrow().sealed()
    }

    pub fn set_word(&self, register: u8, value: u16) {
        self.state.borrow_mut().words.insert(register, value);
    }
}

impl Transport for SimGauge {
    type Error = SimError;

    async fn write(&mut self, _address: u8, register: u8, data: &[u8]) -> Result<(), SimError> {
        self.state.borrow_mut().write(register, data)
    }

    async fn read(&mut self, _address: u8, register: u8, data: &mut [u8]) -> Result<(), SimError> {
        self.state.borrow_mut().read(register, data)
    }
}

pub fn sim_driver(sim: &SimGauge) -> Bq27441<SimGauge, YieldDelay> {
    Bq27441::new(sim.clone(), YieldDelay, ADDR)
}

pub fn sim_driver_with_polls(sim: &SimGauge, poll_attempts: u32) -> Bq27441<SimGauge, YieldDelay> {
    Bq27441::with_config(
        sim.clone(),
        YieldDelay,
        GaugeConfig {
            poll_attempts,
            ..GaugeConfig::default()
        },
    )
}

/// Index of the first logged operation matching `pred`
pub fn position(log: &[Op], pred: impl Fn(&Op) -> bool) -> Option<usize> {
    log.iter().position(pred)
}

pub fn is_control(op: &Op, subcommand: u16) -> bool {
    matches!(op, Op::Write { register, data }
        if *register == commands::CONTROL && data[..] == subcommand.to_le_bytes())
}

pub fn is_write_to(op: &Op, target: u8) -> bool {
    matches!(op, Op::Write { register, .. } if *register == target)
}

pub fn is_read_of(op: &Op, target: u8) -> bool {
    matches!(op, Op::Read { register, .. } if *register == target)
}
